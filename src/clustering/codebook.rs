//! Frozen vocabularies and their binary file format.
//!
//! # File layout
//!
//! ```text
//! i32 num_clusters
//! i32 dimension
//! f64 mean[num_clusters][dimension]
//! ```
//!
//! All values are big-endian. The reader requires the exact byte count the
//! header announces.

use std::path::Path;

use tracing::debug;

use crate::clustering::cluster::{Cluster, nearest_cluster};
use crate::storage::CodecError;
use crate::storage::binary::{BYTES_PER_F64, BYTES_PER_I32, ByteReader, ByteWriter, read_file};
use crate::vector::{ClusterId, VectorDimension, VectorError};

/// An ordered, non-empty array of clusters that all share one dimension.
///
/// Read-only once built; share it behind an `Arc` between aggregators.
#[derive(Debug)]
pub struct Codebook {
    clusters: Vec<Cluster>,
    dimension: VectorDimension,
}

impl Codebook {
    /// Builds a codebook from trained clusters.
    pub fn from_clusters(clusters: Vec<Cluster>) -> Result<Self, VectorError> {
        let first = clusters.first().ok_or(VectorError::InvalidDimension {
            dimension: 0,
            reason: "A codebook needs at least one cluster",
        })?;
        let dimension = VectorDimension::new(first.dimension())?;
        for cluster in &clusters {
            dimension.validate_vector(cluster.mean())?;
        }
        Ok(Self {
            clusters,
            dimension,
        })
    }

    /// Builds a codebook directly from means.
    pub fn from_means(means: Vec<Vec<f64>>) -> Result<Self, VectorError> {
        Self::from_clusters(means.into_iter().map(Cluster::new).collect())
    }

    /// Number of clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension.get()
    }

    #[must_use]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn means(&self) -> impl Iterator<Item = &[f64]> {
        self.clusters.iter().map(Cluster::mean)
    }

    #[must_use]
    pub fn mean(&self, id: ClusterId) -> Option<&[f64]> {
        self.clusters.get(id.index()).map(Cluster::mean)
    }

    /// Checks that `vector` can be quantized against this codebook.
    pub fn validate(&self, vector: &[f64]) -> Result<(), VectorError> {
        self.dimension.validate_vector(vector)
    }

    /// Nearest cluster to `vector`, first minimum on ties.
    ///
    /// The caller is responsible for matching dimensions, see
    /// [`Codebook::validate`].
    #[must_use]
    pub fn nearest(&self, vector: &[f64]) -> ClusterId {
        nearest_cluster(&self.clusters, vector).map_or(ClusterId::new(0), ClusterId::from)
    }

    fn encode(&self) -> Result<ByteWriter, CodecError> {
        let dimension = self.dimension();
        let mut writer = ByteWriter::with_capacity(
            2 * BYTES_PER_I32 + self.len() * dimension * BYTES_PER_F64,
        );
        writer.put_size("num_clusters", self.len())?;
        writer.put_size("dimension", dimension)?;
        for cluster in &self.clusters {
            writer.put_f64_slice(cluster.mean());
        }
        Ok(writer)
    }

    /// Encodes the codebook into its file representation.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(self.encode()?.into_bytes())
    }

    /// Decodes a codebook; `source` names the origin in error messages.
    pub fn from_bytes(bytes: &[u8], source: &Path) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(bytes, source);
        let num_clusters = reader.read_size("num_clusters")?;
        let dimension = reader.read_size("dimension")?;
        let values = num_clusters.checked_mul(dimension).ok_or_else(|| {
            CodecError::InvalidHeader {
                path: source.to_path_buf(),
                field: "num_clusters",
                value: num_clusters as i64,
            }
        })?;
        reader.expect_exact_f64s(values)?;

        let mut clusters = Vec::with_capacity(num_clusters);
        for _ in 0..num_clusters {
            clusters.push(Cluster::new(reader.read_f64_vec(dimension)?));
        }
        let dimension = VectorDimension::new(dimension).map_err(|e| CodecError::Unencodable {
            what: "codebook",
            reason: e.to_string(),
        })?;
        Ok(Self {
            clusters,
            dimension,
        })
    }

    /// Writes the codebook to `path`.
    pub fn write_clusters(&self, path: &Path) -> Result<(), CodecError> {
        self.encode()?.write_to(path)?;
        debug!(
            "wrote codebook with {} clusters of dimension {} to {}",
            self.len(),
            self.dimension(),
            path.display()
        );
        Ok(())
    }

    /// Reads a codebook written by [`Codebook::write_clusters`].
    pub fn read_clusters(path: &Path) -> Result<Self, CodecError> {
        let bytes = read_file(path)?;
        Self::from_bytes(&bytes, path)
    }
}
