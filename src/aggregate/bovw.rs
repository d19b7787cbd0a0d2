use crate::aggregate::{AggregatedFeature, AggregationError, Aggregator, check_features};
use crate::clustering::Codebook;

/// Bag-of-visual-words: counts how many local features fall into each
/// cluster.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bovw;

impl Bovw {
    /// Histogram of nearest-cluster assignments; entries sum to
    /// `features.len()`.
    pub fn histogram(
        &self,
        codebook: &Codebook,
        features: &[Vec<f64>],
    ) -> Result<Vec<u32>, AggregationError> {
        check_features(codebook, features)?;
        let mut bins = vec![0u32; codebook.len()];
        for feature in features {
            bins[codebook.nearest(feature).index()] += 1;
        }
        Ok(bins)
    }
}

impl Aggregator for Bovw {
    fn name(&self) -> &'static str {
        "bovw"
    }

    fn aggregate(
        &self,
        codebook: &Codebook,
        features: &[Vec<f64>],
    ) -> Result<AggregatedFeature, AggregationError> {
        self.histogram(codebook, features)
            .map(AggregatedFeature::Histogram)
    }
}

/// Token form of a histogram: `v<index>` once per occurrence, in bin order.
#[must_use]
pub fn histogram_tokens(bins: &[u32]) -> Vec<String> {
    let mut tokens = Vec::with_capacity(bins.iter().map(|&count| count as usize).sum());
    for (index, &count) in bins.iter().enumerate() {
        for _ in 0..count {
            tokens.push(format!("v{index}"));
        }
    }
    tokens
}
