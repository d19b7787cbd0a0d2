//! Error types for simdex
//!
//! Each subsystem owns a structured error enum. [`IndexError`] gathers them
//! for callers that drive several subsystems at once and adds stable status
//! codes and recovery hints.

use std::path::PathBuf;
use thiserror::Error;

use crate::aggregate::AggregationError;
use crate::clustering::ClusteringError;
use crate::features::FeatureError;
use crate::hashing::HashingError;
use crate::metric::MetricIndexError;
use crate::vector::VectorError;

pub use crate::storage::{CodecError, StorageError, StorageResult};

/// Crate-level error type
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Clustering(#[from] ClusteringError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Hashing(#[from] HashingError),

    #[error(transparent)]
    MetricIndex(#[from] MetricIndexError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    #[error("Failed to read input '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    General(String),
}

impl IndexError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::Clustering(ClusteringError::TooFewFeatures { .. })
            | Self::Aggregation(AggregationError::TooFewFeatures { .. }) => "TOO_FEW_FEATURES",
            Self::Clustering(ClusteringError::WorkerFailed { .. }) => "WORKER_FAILED",
            Self::Clustering(_) => "CLUSTERING_ERROR",
            Self::Codec(_) => "DECODE_ERROR",
            Self::Aggregation(_) => "AGGREGATION_ERROR",
            Self::Hashing(HashingError::Codec(_)) => "DECODE_ERROR",
            Self::Hashing(_) => "HASHING_ERROR",
            Self::MetricIndex(MetricIndexError::CorpusTooSmall { .. }) => "CORPUS_TOO_SMALL",
            Self::MetricIndex(MetricIndexError::NotReady(_)) => "INDEX_NOT_READY",
            Self::MetricIndex(_) => "METRIC_INDEX_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Vector(_) => "INVALID_VECTOR",
            Self::Feature(_) => "FEATURE_ERROR",
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::General(_) => "GENERAL_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Clustering(ClusteringError::TooFewFeatures { .. })
            | Self::Aggregation(AggregationError::TooFewFeatures { .. }) => vec![
                "Lower clustering.num_clusters",
                "Raise clustering.sample_documents or add items with local features",
            ],
            Self::Clustering(ClusteringError::WorkerFailed { .. }) => vec![
                "The clustering step was aborted and the means were left unchanged",
                "Retry with the sequential engine to locate the failing input",
            ],
            Self::Codec(_) | Self::Hashing(HashingError::Codec(_)) => vec![
                "Regenerate the bank or codebook file",
                "Check that the file was copied completely",
            ],
            Self::MetricIndex(MetricIndexError::CorpusTooSmall { .. }) => vec![
                "Add items with global features before creating the index",
                "Lower metric_spaces.num_reference_objects",
            ],
            Self::MetricIndex(MetricIndexError::NotReady(_)) => {
                vec!["Run create_index, or open an index directory that holds a reference set"]
            }
            Self::ConfigError { .. } => vec![
                "Run 'simdex init --force' to regenerate the settings file",
                "Check SIMDEX_* environment variables for typos",
            ],
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for crate-level operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T, IndexError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: &str) -> Result<T, IndexError> {
        self.map_err(|e| IndexError::General(format!("{msg}: {e}")))
    }
}
