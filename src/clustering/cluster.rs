use std::sync::atomic::{AtomicUsize, Ordering};

use crate::clustering::atomic::AtomicF64;
use crate::vector::squared_l2;

/// A vocabulary entry: the cluster mean plus the accumulators of the current
/// assignment round.
///
/// During training the accumulators are shared between worker threads and
/// only ever touched through atomic read-modify-write operations. The mean is
/// replaced between rounds, never while an assignment round is in flight.
#[derive(Debug)]
pub struct Cluster {
    mean: Vec<f64>,
    size: AtomicUsize,
    accumulator: Vec<AtomicF64>,
    stress: f64,
}

impl Cluster {
    /// Creates a cluster centered on `mean` with empty accumulators.
    pub fn new(mean: Vec<f64>) -> Self {
        let accumulator = (0..mean.len()).map(|_| AtomicF64::default()).collect();
        Self {
            mean,
            size: AtomicUsize::new(0),
            accumulator,
            stress: 0.0,
        }
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Number of vectors assigned in the last round.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Squared mean displacement contributed by the last update, weighted by
    /// the cluster size.
    pub fn stress(&self) -> f64 {
        self.stress
    }

    /// Squared Euclidean distance from the mean to `vector`.
    pub fn squared_distance(&self, vector: &[f64]) -> f64 {
        squared_l2(&self.mean, vector)
    }

    /// Clears size and accumulator for a new round.
    pub(crate) fn reset(&self) {
        self.size.store(0, Ordering::Release);
        for cell in &self.accumulator {
            cell.store(0.0);
        }
    }

    /// Adds a member to this cluster. Safe to call from many threads at once.
    pub(crate) fn add_member(&self, vector: &[f64]) {
        for (cell, &value) in self.accumulator.iter().zip(vector) {
            cell.fetch_add(value);
        }
        self.size.fetch_add(1, Ordering::AcqRel);
    }

    /// Mean of the members accumulated in this round.
    ///
    /// Returns `None` for an empty cluster; callers rescue those before
    /// recomputing.
    pub(crate) fn accumulated_mean(&self) -> Option<Vec<f64>> {
        let size = self.size();
        if size == 0 {
            return None;
        }
        let divisor = size as f64;
        Some(
            self.accumulator
                .iter()
                .map(|cell| cell.load() / divisor)
                .collect(),
        )
    }

    /// Stress of moving from the current mean to `new_mean`.
    pub(crate) fn stress_towards(&self, new_mean: &[f64]) -> f64 {
        self.size() as f64 * squared_l2(&self.mean, new_mean)
    }

    pub(crate) fn apply(&mut self, new_mean: Vec<f64>, stress: f64) {
        debug_assert_eq!(new_mean.len(), self.mean.len());
        self.mean = new_mean;
        self.stress = stress;
    }
}

/// Index of the cluster whose mean is closest to `vector`.
///
/// The first minimum wins on ties. Returns `None` only for an empty slice.
pub fn nearest_cluster(clusters: &[Cluster], vector: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, cluster) in clusters.iter().enumerate() {
        let distance = cluster.squared_distance(vector);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}
