//! Distance and normalization helpers over `f64` feature vectors.
//!
//! These are the defaults used by the clustering engine and aggregators.
//! Descriptor-specific distances are supplied by callers through
//! [`FeatureDistance`].

/// A distance function between two feature vectors.
///
/// Implemented for plain functions and closures so callers can pass a
/// descriptor's own metric without wrapping it.
pub trait FeatureDistance: Send + Sync {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;
}

impl<F> FeatureDistance for F
where
    F: Fn(&[f64], &[f64]) -> f64 + Send + Sync,
{
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        self(a, b)
    }
}

/// Euclidean distance, the default metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct L2Distance;

impl FeatureDistance for L2Distance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        l2_distance(a, b)
    }
}

/// Squared Euclidean distance.
///
/// Components beyond the shorter vector are ignored.
pub fn squared_l2(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Euclidean distance.
pub fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    squared_l2(a, b).sqrt()
}

/// Dot product over the shared prefix of both vectors.
///
/// Hash banks rely on the prefix semantics: a vector shorter than the bank
/// dimension behaves as if zero-padded.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Normalizes a vector in place to unit length.
///
/// Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f64]) {
    let norm = l2_norm(v);
    if norm > f64::EPSILON {
        for value in v.iter_mut() {
            *value /= norm;
        }
    }
}

/// Returns the position of the first NaN or infinite component.
pub fn first_non_finite(v: &[f64]) -> Option<usize> {
    v.iter().position(|x| !x.is_finite())
}
