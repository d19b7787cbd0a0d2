//! Test: bit-sampling and LSH banks
//!
//! Covers code ranges, persistence and the locality property: vectors that
//! are close agree on far more bundles than unrelated ones.

use crate::common::{global_store, perturb, random_vectors};
use rand::SeedableRng;
use rand::rngs::StdRng;
use simdex::hashing::{
    BitSamplingBank, BitSamplingParams, HashBank, HashSearchOptions, HashSearcher, HashingError,
    LshBank, LshParams,
};
use simdex::{CodecError, ItemId, ItemStore};
use tempfile::TempDir;

fn agreements(bank: &dyn HashBank, a: &[f64], b: &[f64]) -> usize {
    let a = bank.hash(a).unwrap();
    let b = bank.hash(b).unwrap();
    a.iter().zip(&b).filter(|(x, y)| x == y).count()
}

/// Total bundle agreements for near pairs and for unrelated pairs.
fn collision_totals(bank: &dyn HashBank, dimension: usize) -> (usize, usize) {
    let bases = random_vectors(100, dimension, 10.0, 1);
    let others = random_vectors(100, dimension, 10.0, 2);
    let mut rng = StdRng::seed_from_u64(3);

    let mut near = 0;
    let mut far = 0;
    for (base, other) in bases.iter().zip(&others) {
        near += agreements(bank, base, &perturb(base, 0.2, &mut rng));
        far += agreements(bank, base, other);
    }
    (near, far)
}

#[test]
fn test_two_bit_codes_stay_in_range() {
    let bank = BitSamplingBank::generate(
        &BitSamplingParams {
            bits: 2,
            dimensions: 2,
            num_function_bundles: 1,
            w: 4.0,
        },
        Some(5),
    )
    .unwrap();

    let mut seen = std::collections::HashSet::new();
    for vector in random_vectors(200, 2, 1.0, 9) {
        let codes = bank.generate_hashes(&vector).unwrap();
        assert_eq!(codes.len(), 1);
        assert!(codes[0] <= 3);
        seen.insert(codes[0]);
    }
    assert!(seen.len() >= 2);
}

#[test]
fn test_bit_sampling_locality() {
    let bank = BitSamplingBank::generate(
        &BitSamplingParams {
            bits: 8,
            dimensions: 16,
            num_function_bundles: 32,
            w: 4.0,
        },
        Some(21),
    )
    .unwrap();

    let (near, far) = collision_totals(&bank, 16);
    assert!(near > 3 * far, "near {near} vs far {far}");
}

#[test]
fn test_lsh_locality() {
    let bank = LshBank::generate(
        &LshParams {
            dimensions: 16,
            num_function_bundles: 64,
            bin_length: 4.0,
            dilation: 1.0,
        },
        Some(22),
    )
    .unwrap();

    let (near, far) = collision_totals(&bank, 16);
    assert!(near > 3 * far, "near {near} vs far {far}");
}

#[test]
fn test_banks_hash_identically_after_reload() {
    let temp_dir = TempDir::new().unwrap();
    let vectors = random_vectors(20, 12, 5.0, 4);

    let bit_path = temp_dir.path().join("bit_sampling.dat");
    let bits = BitSamplingBank::generate(
        &BitSamplingParams {
            bits: 6,
            dimensions: 12,
            num_function_bundles: 10,
            w: 4.0,
        },
        Some(1),
    )
    .unwrap();
    bits.write(&bit_path).unwrap();
    assert_eq!(
        std::fs::metadata(&bit_path).unwrap().len(),
        3 * 4 + 10 * 6 * 12 * 8
    );
    let reloaded = BitSamplingBank::read(&bit_path).unwrap();

    let lsh_path = temp_dir.path().join("lsh.dat");
    let params = LshParams {
        dimensions: 12,
        num_function_bundles: 7,
        bin_length: 2.0,
        dilation: 1.0,
    };
    let lsh = LshBank::generate(&params, Some(2)).unwrap();
    lsh.write(&lsh_path).unwrap();
    assert_eq!(
        std::fs::metadata(&lsh_path).unwrap().len(),
        2 * 4 + (7 + 7 * 12) * 8
    );
    let lsh_reloaded = LshBank::read(&lsh_path, params.bin_length).unwrap();

    for vector in &vectors {
        assert_eq!(bits.hash(vector).unwrap(), reloaded.hash(vector).unwrap());
        assert_eq!(lsh.hash(vector).unwrap(), lsh_reloaded.hash(vector).unwrap());
    }
}

#[test]
fn test_corrupt_and_oversized_inputs_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lsh.dat");
    let lsh = LshBank::generate(
        &LshParams {
            dimensions: 4,
            num_function_bundles: 3,
            bin_length: 1.0,
            dilation: 1.0,
        },
        Some(3),
    )
    .unwrap();
    lsh.write(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();
    assert!(matches!(
        LshBank::read(&path, 1.0),
        Err(HashingError::Codec(CodecError::LengthMismatch { .. }))
    ));

    assert!(matches!(
        lsh.hash(&[0.0; 5]),
        Err(HashingError::VectorTooLong {
            dimensions: 4,
            actual: 5
        })
    ));
    assert!(matches!(
        lsh.hash(&[0.0, f64::NAN]),
        Err(HashingError::NonFinite { position: 1 })
    ));
    // Shorter vectors behave as if zero-padded
    assert_eq!(lsh.hash(&[1.0, 2.0]).unwrap(), lsh.hash(&[1.0, 2.0, 0.0, 0.0]).unwrap());
}

#[test]
fn test_searcher_finds_near_duplicate() {
    let vectors = random_vectors(200, 16, 10.0, 12);
    let mut rng = StdRng::seed_from_u64(13);
    let query = perturb(&vectors[42], 0.05, &mut rng);
    let store = global_store(vectors);

    let bank = BitSamplingBank::generate(
        &BitSamplingParams {
            bits: 8,
            dimensions: 16,
            num_function_bundles: 24,
            w: 4.0,
        },
        Some(14),
    )
    .unwrap();
    let searcher = HashSearcher::new(&bank, "global", HashSearchOptions::default());
    assert_eq!(searcher.index_all(&store).unwrap(), 200);

    let tokens = store.field(ItemId::new(42), "global_bit_sampling").unwrap();
    assert_eq!(tokens.as_tokens().unwrap().len(), 24);

    let hits = searcher.search(&store, &query).unwrap();
    assert_eq!(hits[0].item, ItemId::new(42));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}
