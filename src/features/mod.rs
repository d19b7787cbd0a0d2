//! Feature extraction contract.
//!
//! Concrete descriptors (color, edge and texture histograms, keypoint
//! descriptors) live outside this crate. The indexes only need an extractor
//! that turns raw item content into one global vector or an ordered list of
//! local vectors, plus a way to pick an extractor by name at runtime, which
//! [`ExtractorRegistry`] provides without any dynamic loading.

mod registry;
mod text;

pub use registry::{ExtractorRegistry, GlobalConstructor, LocalConstructor};
pub use text::{TextLinesExtractor, TextVectorExtractor, parse_vector};

use thiserror::Error;

use crate::vector::{FeatureDistance, L2Distance};

/// Type-safe extractor identifier.
///
/// Uses `&'static str` so tags are free to copy and compare; the built-in
/// tags are compile-time constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKind(&'static str);

impl FeatureKind {
    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extraction and lookup errors with actionable suggestions.
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error(
        "Unknown feature kind '{0}'\nSuggestion: Use one of the registered kinds, see ExtractorRegistry::global_kinds and ExtractorRegistry::local_kinds"
    )]
    UnknownKind(String),

    #[error("Could not parse component {position} '{token}': not a number")]
    InvalidComponent { position: usize, token: String },

    #[error("No feature found in input\nSuggestion: Provide at least one numeric component")]
    Empty,

    #[error("Feature has a non-finite component at position {0}")]
    NonFinite(usize),
}

/// Produces one global descriptor per item.
pub trait GlobalFeatureExtractor: Send + Sync {
    fn kind(&self) -> FeatureKind;

    fn extract(&self, content: &[u8]) -> Result<Vec<f64>, FeatureError>;

    /// Distance between two descriptors of this kind. Euclidean by default.
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        L2Distance.distance(a, b)
    }
}

/// Produces an ordered list of local descriptors per item.
pub trait LocalFeatureExtractor: Send + Sync {
    fn kind(&self) -> FeatureKind;

    fn extract(&self, content: &[u8]) -> Result<Vec<Vec<f64>>, FeatureError>;
}
