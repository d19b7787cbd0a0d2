//! Bit-sampling hash bank.
//!
//! # File layout
//!
//! ```text
//! i32 bits
//! i32 dimensions
//! i32 num_function_bundles
//! f64 hyperplane[num_function_bundles][bits][dimensions]
//! ```

use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hashing::{HashBank, HashingError, check_input, require_positive, seeded_rng};
use crate::storage::binary::{BYTES_PER_F64, BYTES_PER_I32, ByteReader, ByteWriter, read_file};
use crate::vector::dot;

/// Codes are composed into an `i64`, one bit per hyperplane.
const MAX_BITS: usize = 62;

/// Generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitSamplingParams {
    pub bits: usize,
    pub dimensions: usize,
    pub num_function_bundles: usize,
    /// Hyperplane components are drawn from `[-w/2, w/2]`.
    pub w: f64,
}

impl Default for BitSamplingParams {
    fn default() -> Self {
        Self {
            bits: 12,
            dimensions: 640,
            num_function_bundles: 150,
            w: 4.0,
        }
    }
}

impl BitSamplingParams {
    pub fn validate(&self) -> Result<(), HashingError> {
        require_positive("bits", self.bits)?;
        require_positive("dimensions", self.dimensions)?;
        require_positive("num_function_bundles", self.num_function_bundles)?;
        check_bits(self.bits)?;
        if !(self.w.is_finite() && self.w > 0.0) {
            return Err(HashingError::InvalidParameter {
                name: "w",
                reason: format!("{} is not a positive number", self.w),
            });
        }
        Ok(())
    }
}

fn check_bits(bits: usize) -> Result<(), HashingError> {
    if bits > MAX_BITS {
        return Err(HashingError::InvalidParameter {
            name: "bits",
            reason: format!("{bits} exceeds the maximum of {MAX_BITS}"),
        });
    }
    Ok(())
}

/// Random hyperplanes grouped in bundles of `bits`.
#[derive(Debug, Clone, PartialEq)]
pub struct BitSamplingBank {
    bits: usize,
    dimensions: usize,
    num_function_bundles: usize,
    /// Row-major `[bundle][bit][dimension]`.
    hyperplanes: Vec<f64>,
}

impl BitSamplingBank {
    /// Draws a new bank. `seed` makes the draw reproducible.
    pub fn generate(params: &BitSamplingParams, seed: Option<u64>) -> Result<Self, HashingError> {
        params.validate()?;
        let mut rng = seeded_rng(seed);
        let half = params.w / 2.0;
        let len = params.num_function_bundles * params.bits * params.dimensions;
        let hyperplanes = (0..len).map(|_| rng.random_range(-half..=half)).collect();
        debug!(
            "generated bit-sampling bank: {} bundles of {} bits over {} dimensions",
            params.num_function_bundles, params.bits, params.dimensions
        );
        Ok(Self {
            bits: params.bits,
            dimensions: params.dimensions,
            num_function_bundles: params.num_function_bundles,
            hyperplanes,
        })
    }

    #[must_use]
    pub fn bits(&self) -> usize {
        self.bits
    }

    fn hyperplane(&self, bundle: usize, bit: usize) -> &[f64] {
        let start = (bundle * self.bits + bit) * self.dimensions;
        &self.hyperplanes[start..start + self.dimensions]
    }

    /// Hashes `vector` into one `bits`-wide code per bundle.
    ///
    /// Bit `j` of a code is set when the projection on hyperplane `j` is
    /// strictly positive; a zero projection yields a clear bit.
    pub fn generate_hashes(&self, vector: &[f64]) -> Result<Vec<u64>, HashingError> {
        check_input(vector, self.dimensions)?;
        let codes = (0..self.num_function_bundles)
            .map(|bundle| {
                (0..self.bits).fold(0u64, |code, bit| {
                    if dot(vector, self.hyperplane(bundle, bit)) > 0.0 {
                        code | (1 << bit)
                    } else {
                        code
                    }
                })
            })
            .collect();
        Ok(codes)
    }

    /// Writes the bank to `path`.
    pub fn write(&self, path: &Path) -> Result<(), HashingError> {
        let mut writer =
            ByteWriter::with_capacity(3 * BYTES_PER_I32 + self.hyperplanes.len() * BYTES_PER_F64);
        writer.put_size("bits", self.bits)?;
        writer.put_size("dimensions", self.dimensions)?;
        writer.put_size("num_function_bundles", self.num_function_bundles)?;
        writer.put_f64_slice(&self.hyperplanes);
        writer.write_to(path)?;
        Ok(())
    }

    /// Loads a bank written by [`BitSamplingBank::write`].
    pub fn read(path: &Path) -> Result<Self, HashingError> {
        let bytes = read_file(path)?;
        let mut reader = ByteReader::new(&bytes, path);
        let bits = reader.read_size("bits")?;
        let dimensions = reader.read_size("dimensions")?;
        let num_function_bundles = reader.read_size("num_function_bundles")?;
        check_bits(bits)?;

        let len = num_function_bundles
            .checked_mul(bits)
            .and_then(|n| n.checked_mul(dimensions))
            .ok_or_else(|| HashingError::InvalidParameter {
                name: "num_function_bundles",
                reason: "bank size overflows".to_string(),
            })?;
        reader.expect_exact_f64s(len)?;
        let hyperplanes = reader.read_f64_vec(len)?;
        debug!(
            "loaded bit-sampling bank from {}: {num_function_bundles} bundles of {bits} bits",
            path.display()
        );
        Ok(Self {
            bits,
            dimensions,
            num_function_bundles,
            hyperplanes,
        })
    }
}

impl HashBank for BitSamplingBank {
    fn name(&self) -> &'static str {
        "bit_sampling"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn num_function_bundles(&self) -> usize {
        self.num_function_bundles
    }

    fn hash(&self, vector: &[f64]) -> Result<Vec<i64>, HashingError> {
        Ok(self
            .generate_hashes(vector)?
            .into_iter()
            .map(|code| code as i64)
            .collect())
    }
}
