//! Aggregation of variable-length local feature lists into fixed-length
//! vectors.
//!
//! An [`Aggregator`] quantizes every local feature of an item against a
//! [`Codebook`] and folds the result into one vector whose length depends
//! only on the codebook:
//!
//! - [`Bovw`]: occurrence histogram of length `K`
//! - [`Vlad`]: residual sums of length `K * D`
//!
//! [`CorpusAggregator`] runs a set of aggregators over every live item of an
//! [`crate::storage::ItemStore`] and writes the results back as fields.

mod bovw;
mod corpus;
mod vlad;

pub use bovw::{Bovw, histogram_tokens};
pub use corpus::{AggregationReport, CorpusAggregator, aggregate_field_name};
pub use vlad::{DEFAULT_QUANTIZATION_LEVELS, Vlad};

use std::sync::Arc;

use thiserror::Error;

use crate::clustering::Codebook;
use crate::storage::FieldValue;
use crate::vector::VectorError;

/// Errors that can occur while aggregating one item.
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error(
        "Not enough local features: {features} features for a vocabulary of {clusters}\nSuggestion: Use a smaller vocabulary or extract more local features per item"
    )]
    TooFewFeatures { features: usize, clusters: usize },

    #[error("Local feature does not match the codebook: {0}")]
    Vector(#[from] VectorError),
}

/// Output of an aggregator for one codebook.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatedFeature {
    /// Occurrence count per cluster.
    Histogram(Vec<u32>),
    /// Dense vector, possibly quantized to integral values.
    Vector(Vec<f64>),
}

impl AggregatedFeature {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Histogram(bins) => bins.len(),
            Self::Vector(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encodes the feature for the item store.
    ///
    /// Histograms become `v<index>` tokens repeated once per occurrence;
    /// vectors become big-endian `f64` bytes.
    #[must_use]
    pub fn to_field(&self) -> FieldValue {
        match self {
            Self::Histogram(bins) => FieldValue::Tokens(histogram_tokens(bins)),
            Self::Vector(values) => {
                let mut bytes = Vec::with_capacity(values.len() * 8);
                for value in values {
                    bytes.extend_from_slice(&value.to_be_bytes());
                }
                FieldValue::Bytes(bytes)
            }
        }
    }
}

/// Folds a local feature list into one fixed-length vector per codebook.
pub trait Aggregator: Send + Sync {
    /// Short name used in field names, e.g. `"bovw"`.
    fn name(&self) -> &'static str;

    fn aggregate(
        &self,
        codebook: &Codebook,
        features: &[Vec<f64>],
    ) -> Result<AggregatedFeature, AggregationError>;

    /// Aggregates against several vocabularies, one output per codebook.
    fn aggregate_all(
        &self,
        codebooks: &[Arc<Codebook>],
        features: &[Vec<f64>],
    ) -> Result<Vec<AggregatedFeature>, AggregationError> {
        codebooks
            .iter()
            .map(|codebook| self.aggregate(codebook, features))
            .collect()
    }
}

/// Checks the shared aggregation precondition.
pub(crate) fn check_features(
    codebook: &Codebook,
    features: &[Vec<f64>],
) -> Result<(), AggregationError> {
    if features.len() < codebook.len() {
        return Err(AggregationError::TooFewFeatures {
            features: features.len(),
            clusters: codebook.len(),
        });
    }
    for feature in features {
        codebook.validate(feature)?;
    }
    Ok(())
}
