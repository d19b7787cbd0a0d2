//! K-means clustering for visual vocabularies.
//!
//! # Algorithm Details
//! - Distance metric: Euclidean
//! - Initialization: `k` distinct training vectors drawn uniformly at random
//! - One Lloyd iteration per [`Clusterer::clustering_step`], which returns the
//!   overall stress `Σ size · ‖old_mean − new_mean‖²` as convergence signal
//! - Empty clusters are rescued by assigning one random training vector
//!
//! The iteration policy lives in [`crate::clustering::train`]; this module
//! only knows how to run a single step.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clustering::cluster::{Cluster, nearest_cluster};
use crate::clustering::codebook::Codebook;
use crate::storage::CodecError;
use crate::vector::{VectorError, first_non_finite};

/// Errors that can occur during clustering operations.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error("Invalid cluster count: {0}\nSuggestion: Use at least one cluster")]
    InvalidClusterCount(usize),

    #[error(
        "Too few training vectors: {features} vectors for {clusters} clusters\nSuggestion: Provide more training vectors than clusters or reduce the vocabulary size"
    )]
    TooFewFeatures { features: usize, clusters: usize },

    #[error("Clustering has not been initialized\nSuggestion: Call init() before clustering_step()")]
    NotInitialized,

    #[error("Expected {expected} initial means, got {actual}")]
    InvalidInitialMeans { expected: usize, actual: usize },

    #[error(
        "{failed} worker(s) failed during the {phase} phase\nSuggestion: The clustering round was aborted; the previous means are unchanged"
    )]
    WorkerFailed { phase: &'static str, failed: usize },

    #[error("Vector operation error: {0}")]
    Vector(#[from] VectorError),

    #[error("Codebook persistence error: {0}")]
    Codec(#[from] CodecError),
}

/// Options shared by the sequential and parallel engines.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansOptions {
    pub num_clusters: usize,
    /// Seed for initialization and empty-cluster rescue. `None` draws one
    /// from entropy.
    pub seed: Option<u64>,
}

impl KMeansOptions {
    pub fn new(num_clusters: usize) -> Self {
        Self {
            num_clusters,
            seed: None,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Common contract of the clustering engines.
pub trait Clusterer {
    /// Adds a training vector.
    ///
    /// Vectors with NaN or infinite components are discarded and logged;
    /// the return value tells whether the vector was kept.
    fn add_feature(&mut self, feature: Vec<f64>) -> Result<bool, ClusteringError>;

    fn feature_count(&self) -> usize;

    fn num_clusters(&self) -> usize;

    /// Picks the initial means among the training vectors.
    fn init(&mut self) -> Result<(), ClusteringError>;

    /// Starts from the given means instead of a random draw.
    fn init_with_means(&mut self, means: Vec<Vec<f64>>) -> Result<(), ClusteringError>;

    /// Runs one Lloyd iteration and returns the overall stress.
    fn clustering_step(&mut self) -> Result<f64, ClusteringError>;

    fn clusters(&self) -> &[Cluster];

    /// Sum of squared distances from every training vector to its nearest mean.
    fn inertia(&self) -> f64;

    /// Freezes the current means into a codebook.
    fn into_codebook(self) -> Result<Codebook, ClusteringError>
    where
        Self: Sized;
}

/// Training pool and cluster array shared by both engines.
#[derive(Debug)]
pub(crate) struct ClusteringState {
    num_clusters: usize,
    dimension: Option<usize>,
    pub(crate) features: Vec<Vec<f64>>,
    pub(crate) clusters: Vec<Cluster>,
    rng: StdRng,
    initialized: bool,
}

impl ClusteringState {
    pub(crate) fn new(options: &KMeansOptions) -> Self {
        let seed = options.seed.unwrap_or_else(|| rand::rng().random());
        Self {
            num_clusters: options.num_clusters,
            dimension: None,
            features: Vec::new(),
            clusters: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            initialized: false,
        }
    }

    pub(crate) fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    pub(crate) fn add_feature(&mut self, feature: Vec<f64>) -> Result<bool, ClusteringError> {
        if let Some(position) = first_non_finite(&feature) {
            warn!(
                "discarding training vector {} with non-finite component at {position}",
                self.features.len()
            );
            return Ok(false);
        }
        match self.dimension {
            Some(expected) if expected != feature.len() => {
                return Err(VectorError::DimensionMismatch {
                    expected,
                    actual: feature.len(),
                }
                .into());
            }
            Some(_) => {}
            None => {
                if feature.is_empty() {
                    return Err(VectorError::InvalidDimension {
                        dimension: 0,
                        reason: "Training vectors cannot be empty",
                    }
                    .into());
                }
                self.dimension = Some(feature.len());
            }
        }
        self.features.push(feature);
        Ok(true)
    }

    fn check_pool(&self) -> Result<(), ClusteringError> {
        if self.num_clusters == 0 {
            return Err(ClusteringError::InvalidClusterCount(0));
        }
        if self.features.len() <= self.num_clusters {
            return Err(ClusteringError::TooFewFeatures {
                features: self.features.len(),
                clusters: self.num_clusters,
            });
        }
        Ok(())
    }

    pub(crate) fn init(&mut self) -> Result<(), ClusteringError> {
        self.check_pool()?;
        let picks = rand::seq::index::sample(&mut self.rng, self.features.len(), self.num_clusters);
        self.clusters = picks
            .iter()
            .map(|index| Cluster::new(self.features[index].clone()))
            .collect();
        self.initialized = true;
        debug!(
            "initialized {} clusters from {} training vectors",
            self.num_clusters,
            self.features.len()
        );
        Ok(())
    }

    pub(crate) fn init_with_means(&mut self, means: Vec<Vec<f64>>) -> Result<(), ClusteringError> {
        self.check_pool()?;
        if means.len() != self.num_clusters {
            return Err(ClusteringError::InvalidInitialMeans {
                expected: self.num_clusters,
                actual: means.len(),
            });
        }
        if let Some(expected) = self.dimension {
            if let Some(bad) = means.iter().find(|mean| mean.len() != expected) {
                return Err(VectorError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                }
                .into());
            }
        }
        self.clusters = means.into_iter().map(Cluster::new).collect();
        self.initialized = true;
        Ok(())
    }

    pub(crate) fn ensure_initialized(&self) -> Result<(), ClusteringError> {
        if self.initialized {
            Ok(())
        } else {
            Err(ClusteringError::NotInitialized)
        }
    }

    pub(crate) fn reset_clusters(&self) {
        for cluster in &self.clusters {
            cluster.reset();
        }
    }

    /// Assigns one training vector to its nearest cluster.
    pub(crate) fn assign(&self, feature_index: usize) {
        let feature = &self.features[feature_index];
        if let Some(nearest) = nearest_cluster(&self.clusters, feature) {
            self.clusters[nearest].add_member(feature);
        }
    }

    /// Gives every empty cluster one random training vector.
    ///
    /// This keeps clusters from staying empty forever. It is a pragmatic
    /// heuristic: the rescued mean is an arbitrary vector, not the one that
    /// would reduce the error the most.
    pub(crate) fn rescue_empty_clusters(&mut self) -> usize {
        let mut rescued = 0;
        for index in 0..self.clusters.len() {
            if self.clusters[index].size() == 0 {
                let pick = self.rng.random_range(0..self.features.len());
                self.clusters[index].add_member(&self.features[pick]);
                debug!("cluster {index} was empty, rescued with training vector {pick}");
                rescued += 1;
            }
        }
        rescued
    }

    /// New mean of a cluster from this round's accumulator.
    pub(crate) fn next_mean(&self, cluster_index: usize) -> Vec<f64> {
        let cluster = &self.clusters[cluster_index];
        cluster
            .accumulated_mean()
            .unwrap_or_else(|| cluster.mean().to_vec())
    }

    pub(crate) fn stress(&self, cluster_index: usize, new_mean: &[f64]) -> f64 {
        self.clusters[cluster_index].stress_towards(new_mean)
    }

    /// Publishes the new means and returns the overall stress.
    pub(crate) fn apply_round(&mut self, means: Vec<Vec<f64>>, stresses: Vec<f64>) -> f64 {
        let mut total = 0.0;
        for ((cluster, mean), stress) in self.clusters.iter_mut().zip(means).zip(stresses) {
            cluster.apply(mean, stress);
            total += stress;
        }
        debug!("clustering step finished with stress {total:.4}");
        total
    }

    pub(crate) fn inertia(&self) -> f64 {
        self.features
            .iter()
            .filter_map(|feature| {
                nearest_cluster(&self.clusters, feature)
                    .map(|index| self.clusters[index].squared_distance(feature))
            })
            .sum()
    }

    pub(crate) fn into_codebook(self) -> Result<Codebook, ClusteringError> {
        self.ensure_initialized()?;
        Ok(Codebook::from_clusters(self.clusters)?)
    }
}

/// Sequential k-means engine.
#[derive(Debug)]
pub struct KMeans {
    state: ClusteringState,
}

impl KMeans {
    pub fn new(num_clusters: usize) -> Self {
        Self::with_options(KMeansOptions::new(num_clusters))
    }

    pub fn with_options(options: KMeansOptions) -> Self {
        Self {
            state: ClusteringState::new(&options),
        }
    }

    /// Configure a deterministic seed for initialization and rescue.
    pub fn with_seed(num_clusters: usize, seed: u64) -> Self {
        Self::with_options(KMeansOptions::new(num_clusters).with_seed(seed))
    }
}

impl Clusterer for KMeans {
    fn add_feature(&mut self, feature: Vec<f64>) -> Result<bool, ClusteringError> {
        self.state.add_feature(feature)
    }

    fn feature_count(&self) -> usize {
        self.state.features.len()
    }

    fn num_clusters(&self) -> usize {
        self.state.num_clusters()
    }

    fn init(&mut self) -> Result<(), ClusteringError> {
        self.state.init()
    }

    fn init_with_means(&mut self, means: Vec<Vec<f64>>) -> Result<(), ClusteringError> {
        self.state.init_with_means(means)
    }

    fn clustering_step(&mut self) -> Result<f64, ClusteringError> {
        self.state.ensure_initialized()?;
        self.state.reset_clusters();

        for index in 0..self.state.features.len() {
            self.state.assign(index);
        }

        self.state.rescue_empty_clusters();

        let means: Vec<Vec<f64>> = (0..self.state.clusters.len())
            .map(|index| self.state.next_mean(index))
            .collect();
        let stresses: Vec<f64> = means
            .iter()
            .enumerate()
            .map(|(index, mean)| self.state.stress(index, mean))
            .collect();

        Ok(self.state.apply_round(means, stresses))
    }

    fn clusters(&self) -> &[Cluster] {
        &self.state.clusters
    }

    fn inertia(&self) -> f64 {
        self.state.inertia()
    }

    fn into_codebook(self) -> Result<Codebook, ClusteringError> {
        self.state.into_codebook()
    }
}
