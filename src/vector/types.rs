//! Type-safe wrappers and core types shared by every indexing strategy.
//!
//! Feature vectors themselves are plain `f64` slices handed over by the
//! descriptor collaborators; the newtypes here cover identifiers and
//! dimensionality so that the indexes never confuse an item id with a
//! cluster index.

use thiserror::Error;

/// Identifier of a corpus item in the external item store.
///
/// Item ids are dense, zero-based positions (the store supports random access
/// by id), so zero is a valid id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u32);

impl ItemId {
    /// Creates a new `ItemId`.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the id as an index into dense per-item arrays.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for ItemId {
    fn from(value: usize) -> Self {
        Self(value as u32)
    }
}

/// Position of a cluster inside a codebook.
///
/// Cluster ids are zero-based because they double as histogram bins and as
/// the slot index of a VLAD residual block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(u32);

impl ClusterId {
    /// Creates a new `ClusterId`.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the id as an index into the codebook.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for ClusterId {
    fn from(value: usize) -> Self {
        Self(value as u32)
    }
}

/// Type-safe wrapper for feature dimensionality.
///
/// Ensures runtime validation of vector dimensions to prevent mismatches
/// between a vector and the codebook or hash bank it is used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f64]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// A single ranked search result.
///
/// Higher scores are better. The scale depends on the index that produced the
/// hit: footrule similarity for the metric-space index, negated L2 distance
/// for the hash searcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub item: ItemId,
    pub score: f64,
}

impl SearchHit {
    #[must_use]
    pub fn new(item: ItemId, score: f64) -> Self {
        Self { item, score }
    }
}

/// Errors that can occur during vector operations.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors come from the same feature extractor"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error(
        "Vector contains non-finite component at position {position}\nSuggestion: Check the feature extractor output for NaN or infinite values"
    )]
    NonFinite { position: usize },
}
