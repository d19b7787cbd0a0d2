//! Vocabulary construction by k-means clustering.
//!
//! This module provides:
//! - [`KMeans`]: the sequential engine
//! - [`ParallelKMeans`]: the same contract over a scoped worker pool
//! - [`train`] and [`ConvergencePolicy`]: the stopping rule both engines use
//! - [`Codebook`]: frozen cluster means and their binary file format
//! - [`VocabularyBuilder`]: codebooks trained from a corpus sample

mod atomic;
mod cluster;
mod codebook;
mod kmeans;
mod parallel;
mod training;
mod vocabulary;

pub use atomic::AtomicF64;
pub use cluster::{Cluster, nearest_cluster};
pub use codebook::Codebook;
pub use kmeans::{ClusteringError, Clusterer, KMeans, KMeansOptions};
pub use parallel::{DEFAULT_NUM_THREADS, DEFAULT_QUEUE_CAPACITY, ParallelKMeans, ParallelOptions};
pub use training::{
    ConvergencePolicy, DEFAULT_MAX_ITERATIONS, DEFAULT_STRESS_FLOOR, DEFAULT_STRESS_SCALE,
    TrainingReport, iterate, train, train_with_restarts,
};
pub use vocabulary::{
    BuiltCodebook, DEFAULT_SAMPLE_DOCUMENTS, VocabularyBuilder, VocabularyOptions,
    codebook_file_name,
};
