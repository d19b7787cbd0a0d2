use crate::aggregate::{AggregatedFeature, AggregationError, Aggregator, check_features};
use crate::clustering::Codebook;
use crate::vector::l2_normalize;

/// Default number of quantization levels per unit of the normalized vector.
pub const DEFAULT_QUANTIZATION_LEVELS: u32 = 16;

/// Vector of locally aggregated descriptors.
///
/// Residuals `feature - mean` are summed into the `D`-wide slot of the
/// nearest cluster, then the `K * D` vector is L2-normalized. With
/// `quantization_levels > 0` every component is additionally replaced by
/// `floor(levels * v)`, which keeps values in `[-levels, levels]` and makes
/// the stored field compact at the cost of precision. Zero disables this
/// lossy step.
#[derive(Debug, Clone, Copy)]
pub struct Vlad {
    quantization_levels: u32,
}

impl Default for Vlad {
    fn default() -> Self {
        Self::new(DEFAULT_QUANTIZATION_LEVELS)
    }
}

impl Vlad {
    #[must_use]
    pub fn new(quantization_levels: u32) -> Self {
        Self {
            quantization_levels,
        }
    }

    /// Aggregation without quantization.
    #[must_use]
    pub fn unquantized() -> Self {
        Self::new(0)
    }

    #[must_use]
    pub fn quantization_levels(&self) -> u32 {
        self.quantization_levels
    }

    /// Computes the (possibly quantized) VLAD vector.
    pub fn vector(
        &self,
        codebook: &Codebook,
        features: &[Vec<f64>],
    ) -> Result<Vec<f64>, AggregationError> {
        check_features(codebook, features)?;
        let dimension = codebook.dimension();
        let mut vlad = vec![0.0; codebook.len() * dimension];

        for feature in features {
            let nearest = codebook.nearest(feature);
            let Some(mean) = codebook.mean(nearest) else {
                continue;
            };
            let start = nearest.index() * dimension;
            for ((slot, value), center) in vlad[start..start + dimension]
                .iter_mut()
                .zip(feature)
                .zip(mean)
            {
                *slot += value - center;
            }
        }

        l2_normalize(&mut vlad);
        if self.quantization_levels > 0 {
            let levels = f64::from(self.quantization_levels);
            for value in &mut vlad {
                *value = (levels * *value).floor();
            }
        }
        Ok(vlad)
    }
}

impl Aggregator for Vlad {
    fn name(&self) -> &'static str {
        "vlad"
    }

    fn aggregate(
        &self,
        codebook: &Codebook,
        features: &[Vec<f64>],
    ) -> Result<AggregatedFeature, AggregationError> {
        self.vector(codebook, features).map(AggregatedFeature::Vector)
    }
}
