//! p-stable locality-sensitive hashing.
//!
//! Each bundle `k` maps a vector to the bucket
//! `floor((dot(v, a_k) + b_k) / bin_length)` where `a_k` has standard normal
//! components scaled by `dilation` and `b_k` is uniform in `[0, bin_length)`.
//!
//! The collision guarantee of p-stable hashing assumes bounded inputs. Inputs
//! are checked for finiteness and length only; callers with unbounded
//! descriptors should normalize them first, e.g. with
//! [`crate::vector::l2_normalize`].
//!
//! # File layout
//!
//! ```text
//! i32 dimensions
//! i32 num_function_bundles
//! f64 bias[num_function_bundles]
//! f64 projection[num_function_bundles][dimensions]
//! ```
//!
//! The bin length is not part of the file; it comes from [`LshParams`].

use std::f64::consts::TAU;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hashing::{HashBank, HashingError, check_input, require_positive, seeded_rng};
use crate::storage::binary::{BYTES_PER_F64, BYTES_PER_I32, ByteReader, ByteWriter, read_file};
use crate::vector::dot;

/// Generation and hashing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LshParams {
    pub dimensions: usize,
    pub num_function_bundles: usize,
    pub bin_length: f64,
    pub dilation: f64,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            dimensions: 640,
            num_function_bundles: 80,
            bin_length: 10.0,
            dilation: 1.0,
        }
    }
}

fn check_positive_real(name: &'static str, value: f64) -> Result<(), HashingError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(HashingError::InvalidParameter {
            name,
            reason: format!("{value} is not a positive number"),
        });
    }
    Ok(())
}

impl LshParams {
    pub fn validate(&self) -> Result<(), HashingError> {
        require_positive("dimensions", self.dimensions)?;
        require_positive("num_function_bundles", self.num_function_bundles)?;
        check_positive_real("bin_length", self.bin_length)?;
        check_positive_real("dilation", self.dilation)
    }
}

/// Standard normal sample via the Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // (0, 1] keeps the logarithm finite
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Projections and biases of a p-stable hash family.
#[derive(Debug, Clone, PartialEq)]
pub struct LshBank {
    dimensions: usize,
    num_function_bundles: usize,
    bin_length: f64,
    biases: Vec<f64>,
    /// Row-major `[bundle][dimension]`.
    projections: Vec<f64>,
}

impl LshBank {
    /// Draws a new bank. `seed` makes the draw reproducible.
    pub fn generate(params: &LshParams, seed: Option<u64>) -> Result<Self, HashingError> {
        params.validate()?;
        let mut rng = seeded_rng(seed);
        let projections = (0..params.num_function_bundles * params.dimensions)
            .map(|_| standard_normal(&mut rng) * params.dilation)
            .collect();
        let biases = (0..params.num_function_bundles)
            .map(|_| rng.random_range(0.0..params.bin_length))
            .collect();
        debug!(
            "generated LSH bank: {} bundles over {} dimensions",
            params.num_function_bundles, params.dimensions
        );
        Ok(Self {
            dimensions: params.dimensions,
            num_function_bundles: params.num_function_bundles,
            bin_length: params.bin_length,
            biases,
            projections,
        })
    }

    #[must_use]
    pub fn bin_length(&self) -> f64 {
        self.bin_length
    }

    fn projection(&self, bundle: usize) -> &[f64] {
        let start = bundle * self.dimensions;
        &self.projections[start..start + self.dimensions]
    }

    /// Bucket index per bundle.
    pub fn generate_hashes(&self, vector: &[f64]) -> Result<Vec<i64>, HashingError> {
        check_input(vector, self.dimensions)?;
        Ok((0..self.num_function_bundles)
            .map(|bundle| {
                let projected = dot(vector, self.projection(bundle)) + self.biases[bundle];
                (projected / self.bin_length).floor() as i64
            })
            .collect())
    }

    /// Writes the bank to `path`.
    pub fn write(&self, path: &Path) -> Result<(), HashingError> {
        let mut writer = ByteWriter::with_capacity(
            2 * BYTES_PER_I32 + (self.biases.len() + self.projections.len()) * BYTES_PER_F64,
        );
        writer.put_size("dimensions", self.dimensions)?;
        writer.put_size("num_function_bundles", self.num_function_bundles)?;
        writer.put_f64_slice(&self.biases);
        writer.put_f64_slice(&self.projections);
        writer.write_to(path)?;
        Ok(())
    }

    /// Loads a bank written by [`LshBank::write`], hashing with `bin_length`.
    pub fn read(path: &Path, bin_length: f64) -> Result<Self, HashingError> {
        check_positive_real("bin_length", bin_length)?;
        let bytes = read_file(path)?;
        let mut reader = ByteReader::new(&bytes, path);
        let dimensions = reader.read_size("dimensions")?;
        let num_function_bundles = reader.read_size("num_function_bundles")?;

        let len = num_function_bundles
            .checked_mul(dimensions)
            .and_then(|n| n.checked_add(num_function_bundles))
            .ok_or_else(|| HashingError::InvalidParameter {
                name: "num_function_bundles",
                reason: "bank size overflows".to_string(),
            })?;
        reader.expect_exact_f64s(len)?;
        let biases = reader.read_f64_vec(num_function_bundles)?;
        let projections = reader.read_f64_vec(num_function_bundles * dimensions)?;
        debug!(
            "loaded LSH bank from {}: {num_function_bundles} bundles over {dimensions} dimensions",
            path.display()
        );
        Ok(Self {
            dimensions,
            num_function_bundles,
            bin_length,
            biases,
            projections,
        })
    }
}

impl HashBank for LshBank {
    fn name(&self) -> &'static str {
        "lsh"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn num_function_bundles(&self) -> usize {
        self.num_function_bundles
    }

    fn hash(&self, vector: &[f64]) -> Result<Vec<i64>, HashingError> {
        self.generate_hashes(vector)
    }
}
