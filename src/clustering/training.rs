//! Convergence driver for the clustering engines.

use tracing::{debug, info, warn};

use crate::clustering::kmeans::{ClusteringError, Clusterer};

/// Default lower bound of the convergence threshold.
pub const DEFAULT_STRESS_FLOOR: f64 = 20.0;

/// Default number of training vectors per unit of threshold above the floor.
pub const DEFAULT_STRESS_SCALE: f64 = 1000.0;

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// When to stop iterating.
///
/// Training stops once two consecutive stresses differ by less than
/// `max(stress_floor, feature_count / stress_scale)`, or after
/// `max_iterations` steps, whichever comes first.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergencePolicy {
    pub stress_floor: f64,
    pub stress_scale: f64,
    pub max_iterations: usize,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            stress_floor: DEFAULT_STRESS_FLOOR,
            stress_scale: DEFAULT_STRESS_SCALE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ConvergencePolicy {
    /// Stress delta below which a run counts as converged.
    #[must_use]
    pub fn threshold(&self, feature_count: usize) -> f64 {
        let scaled = if self.stress_scale > 0.0 {
            feature_count as f64 / self.stress_scale
        } else {
            0.0
        };
        self.stress_floor.max(scaled)
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn with_stress_floor(mut self, stress_floor: f64) -> Self {
        self.stress_floor = stress_floor;
        self
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub iterations: usize,
    pub final_stress: f64,
    /// `false` when the iteration cap stopped the run.
    pub converged: bool,
}

/// Iterates an already initialized engine until the policy says stop.
pub fn iterate<C: Clusterer + ?Sized>(
    clusterer: &mut C,
    policy: &ConvergencePolicy,
) -> Result<TrainingReport, ClusteringError> {
    let threshold = policy.threshold(clusterer.feature_count());
    let mut previous: Option<f64> = None;
    let mut iterations = 0;

    while iterations < policy.max_iterations {
        let stress = clusterer.clustering_step()?;
        iterations += 1;
        debug!("iteration {iterations}: stress {stress:.4}");

        if let Some(last) = previous {
            if (stress - last).abs() < threshold {
                info!(
                    "clustering converged after {iterations} iterations (stress {stress:.4}, threshold {threshold:.4})"
                );
                return Ok(TrainingReport {
                    iterations,
                    final_stress: stress,
                    converged: true,
                });
            }
        }
        previous = Some(stress);
    }

    let final_stress = previous.unwrap_or(0.0);
    warn!(
        "clustering stopped at the iteration cap of {} without converging (stress {final_stress:.4})",
        policy.max_iterations
    );
    Ok(TrainingReport {
        iterations,
        final_stress,
        converged: false,
    })
}

/// Initializes `clusterer` with random means and iterates to convergence.
pub fn train<C: Clusterer + ?Sized>(
    clusterer: &mut C,
    policy: &ConvergencePolicy,
) -> Result<TrainingReport, ClusteringError> {
    clusterer.init()?;
    iterate(clusterer, policy)
}

/// Trains `restarts` independent engines and keeps the one with the lowest
/// inertia.
///
/// `make` builds a fresh engine for each attempt and receives the attempt
/// number, so callers can derive a per-attempt seed.
pub fn train_with_restarts<C, F>(
    restarts: usize,
    policy: &ConvergencePolicy,
    mut make: F,
) -> Result<(C, TrainingReport), ClusteringError>
where
    C: Clusterer,
    F: FnMut(usize) -> Result<C, ClusteringError>,
{
    let mut best: Option<(C, TrainingReport, f64)> = None;
    for attempt in 0..restarts.max(1) {
        let mut clusterer = make(attempt)?;
        let report = train(&mut clusterer, policy)?;
        let inertia = clusterer.inertia();
        debug!("attempt {attempt}: inertia {inertia:.4}");
        match &best {
            Some((_, _, best_inertia)) if inertia >= *best_inertia => {}
            _ => best = Some((clusterer, report, inertia)),
        }
    }
    best.map(|(clusterer, report, _)| (clusterer, report))
        .ok_or(ClusteringError::NotInitialized)
}
