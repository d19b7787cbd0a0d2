//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simdex::MemoryItemStore;

/// `per_center` points around each center, uniform within `spread` on every
/// axis.
pub fn blobs(centers: &[Vec<f64>], per_center: usize, spread: f64, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut points = Vec::with_capacity(centers.len() * per_center);
    for center in centers {
        for _ in 0..per_center {
            points.push(
                center
                    .iter()
                    .map(|c| c + rng.random_range(-spread..=spread))
                    .collect(),
            );
        }
    }
    points
}

/// `count` vectors uniform in `[-scale, scale]^dimension`.
pub fn random_vectors(count: usize, dimension: usize, scale: f64, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            (0..dimension)
                .map(|_| rng.random_range(-scale..=scale))
                .collect()
        })
        .collect()
}

/// Moves `vector` by `step` along a random direction.
pub fn perturb(vector: &[f64], step: f64, rng: &mut StdRng) -> Vec<f64> {
    let direction: Vec<f64> = vector.iter().map(|_| rng.random_range(-1.0..=1.0)).collect();
    let norm = direction.iter().map(|d| d * d).sum::<f64>().sqrt().max(f64::EPSILON);
    vector
        .iter()
        .zip(&direction)
        .map(|(v, d)| v + step * d / norm)
        .collect()
}

/// A store holding one global vector per input.
pub fn global_store(vectors: Vec<Vec<f64>>) -> MemoryItemStore {
    let store = MemoryItemStore::new();
    for vector in vectors {
        store.add_global(vector);
    }
    store
}

/// Euclidean distance from `point` to the closest of `candidates`.
pub fn closest_distance<'a>(point: &[f64], candidates: impl IntoIterator<Item = &'a [f64]>) -> f64 {
    candidates
        .into_iter()
        .map(|candidate| {
            point
                .iter()
                .zip(candidate)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt()
        })
        .fold(f64::INFINITY, f64::min)
}
