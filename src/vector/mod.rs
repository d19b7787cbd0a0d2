//! Shared vector vocabulary for the indexing subsystems.
//!
//! Feature vectors arrive from external descriptor extractors as `f64`
//! slices. This module defines the identifiers, dimensionality checks and
//! distance helpers that clustering, aggregation, hashing and the metric-space
//! index all build on.

mod distance;
mod types;

pub use distance::{
    FeatureDistance, L2Distance, dot, first_non_finite, l2_distance, l2_norm, l2_normalize,
    squared_l2,
};
pub use types::{ClusterId, ItemId, SearchHit, VectorDimension, VectorError};
