//! Builds codebooks from the local features of a corpus sample.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::clustering::codebook::Codebook;
use crate::clustering::kmeans::{ClusteringError, Clusterer, KMeansOptions};
use crate::clustering::parallel::{ParallelKMeans, ParallelOptions};
use crate::clustering::training::{ConvergencePolicy, TrainingReport, train};
use crate::storage::ItemStore;

/// Default number of items sampled for vocabulary training.
pub const DEFAULT_SAMPLE_DOCUMENTS: usize = 500;

/// File name of the codebook with `num_clusters` entries.
#[must_use]
pub fn codebook_file_name(num_clusters: usize) -> String {
    format!("codebook-{num_clusters}.dat")
}

/// Settings for [`VocabularyBuilder`].
#[derive(Debug, Clone)]
pub struct VocabularyOptions {
    /// One codebook is trained per entry.
    pub num_clusters: Vec<usize>,
    pub sample_documents: usize,
    pub policy: ConvergencePolicy,
    pub pool: ParallelOptions,
    pub seed: Option<u64>,
}

impl Default for VocabularyOptions {
    fn default() -> Self {
        Self {
            num_clusters: vec![512],
            sample_documents: DEFAULT_SAMPLE_DOCUMENTS,
            policy: ConvergencePolicy::default(),
            pool: ParallelOptions::default(),
            seed: None,
        }
    }
}

/// A codebook written by [`VocabularyBuilder::build`].
#[derive(Debug)]
pub struct BuiltCodebook {
    pub num_clusters: usize,
    pub path: PathBuf,
    pub report: TrainingReport,
    pub codebook: Codebook,
}

/// Samples live items from a store and trains one codebook per requested
/// vocabulary size.
pub struct VocabularyBuilder<'a, S: ItemStore + ?Sized> {
    store: &'a S,
    options: VocabularyOptions,
}

impl<'a, S: ItemStore + ?Sized> VocabularyBuilder<'a, S> {
    pub fn new(store: &'a S, options: VocabularyOptions) -> Self {
        Self { store, options }
    }

    /// Local features of a uniform sample of live items, without replacement.
    pub fn sample_features(&self) -> Vec<Vec<f64>> {
        let live = self.store.live_ids();
        let amount = self.options.sample_documents.min(live.len());
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let picks = rand::seq::index::sample(&mut rng, live.len(), amount);

        let mut features = Vec::new();
        for index in picks.iter() {
            if let Some(local) = self.store.local_features(live[index]) {
                features.extend(local);
            }
        }
        info!(
            "sampled {} local features from {amount} of {} live items",
            features.len(),
            live.len()
        );
        features
    }

    /// Trains every configured vocabulary and writes it to
    /// `out_dir/codebook-<k>.dat`.
    pub fn build(&self, out_dir: &Path) -> Result<Vec<BuiltCodebook>, ClusteringError> {
        let features = self.sample_features();
        let mut built = Vec::with_capacity(self.options.num_clusters.len());

        for &num_clusters in &self.options.num_clusters {
            let mut options = KMeansOptions::new(num_clusters);
            options.seed = self.options.seed;
            let mut kmeans = ParallelKMeans::with_options(options, self.options.pool.clone());
            for feature in &features {
                kmeans.add_feature(feature.clone())?;
            }

            let report = train(&mut kmeans, &self.options.policy)?;
            if !report.converged {
                warn!("vocabulary of size {num_clusters} did not converge");
            }

            let codebook = kmeans.into_codebook()?;
            let path = out_dir.join(codebook_file_name(num_clusters));
            codebook.write_clusters(&path)?;
            info!(
                "trained vocabulary of size {num_clusters} in {} iterations, saved to {}",
                report.iterations,
                path.display()
            );
            built.push(BuiltCodebook {
                num_clusters,
                path,
                report,
                codebook,
            });
        }
        Ok(built)
    }
}
