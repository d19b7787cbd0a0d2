//! Random-projection hashing.
//!
//! Two families map a feature vector to one integer code per function bundle:
//!
//! - [`BitSamplingBank`]: `bits` random hyperplanes per bundle, one bit per
//!   hyperplane side
//! - [`LshBank`]: one p-stable projection per bundle, quantized into buckets
//!   of `bin_length`
//!
//! Banks are drawn once, persisted, and then loaded explicitly. A loaded bank
//! is immutable; share it by reference (or `Arc`) between every caller that
//! hashes. Nearby vectors agree on more bundles than distant ones, which
//! [`HashSearcher`] exploits to shortlist candidates before exact re-ranking.

mod bit_sampling;
mod lsh;
mod searcher;

pub use bit_sampling::{BitSamplingBank, BitSamplingParams};
pub use lsh::{LshBank, LshParams};
pub use searcher::{HashSearchOptions, HashSearcher};

use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::storage::{CodecError, StorageError};
use crate::vector::first_non_finite;

/// Errors that can occur while generating, loading or using a hash bank.
#[derive(Error, Debug)]
pub enum HashingError {
    #[error("Invalid hash parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(
        "Vector has {actual} components but the bank covers {dimensions}\nSuggestion: Regenerate the bank with at least {actual} dimensions"
    )]
    VectorTooLong { dimensions: usize, actual: usize },

    #[error("Vector has a non-finite component at position {position}")]
    NonFinite { position: usize },

    #[error("Unknown bank file kind in '{0}'\nSuggestion: Pass --kind bit-sampling or --kind lsh")]
    UnknownBank(PathBuf),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Common interface of the hash families.
pub trait HashBank: Send + Sync {
    /// Short name used in store field names.
    fn name(&self) -> &'static str;

    fn dimensions(&self) -> usize;

    fn num_function_bundles(&self) -> usize;

    /// One code per function bundle.
    fn hash(&self, vector: &[f64]) -> Result<Vec<i64>, HashingError>;
}

/// Rejects inputs a bank cannot hash.
///
/// Vectors shorter than the bank are accepted and behave as if zero-padded.
pub(crate) fn check_input(vector: &[f64], dimensions: usize) -> Result<(), HashingError> {
    if vector.len() > dimensions {
        return Err(HashingError::VectorTooLong {
            dimensions,
            actual: vector.len(),
        });
    }
    if let Some(position) = first_non_finite(vector) {
        return Err(HashingError::NonFinite { position });
    }
    Ok(())
}

pub(crate) fn require_positive(name: &'static str, value: usize) -> Result<(), HashingError> {
    if value == 0 {
        return Err(HashingError::InvalidParameter {
            name,
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    StdRng::seed_from_u64(seed.unwrap_or_else(|| rand::rng().random()))
}

/// Store tokens for a code vector: `"<bundle>_<code>"` per bundle.
///
/// Qualifying the code with its bundle keeps equal codes from different
/// bundles from colliding.
#[must_use]
pub fn hash_tokens(codes: &[i64]) -> Vec<String> {
    codes
        .iter()
        .enumerate()
        .map(|(bundle, code)| format!("{bundle}_{code}"))
        .collect()
}
