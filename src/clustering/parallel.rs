//! Multi-threaded k-means.
//!
//! Each clustering step runs three fork-join rounds over a fixed pool of
//! scoped worker threads:
//!
//! 1. **assign**: work units are training-vector indices; workers add each
//!    vector into its nearest cluster through atomic accumulators.
//! 2. **recompute**: work units are cluster indices; workers compute the new
//!    means from the accumulators.
//! 3. **stress**: work units are cluster indices; workers compare old and new
//!    means.
//!
//! Work is handed out through one bounded queue fed by the calling thread.
//! Closing the queue tells workers to exit, and every round joins all workers
//! before its results are used. New means are published only after the
//! stress round, so no worker ever reads a partially updated mean.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, bounded};
use tracing::{debug, trace};

use crate::clustering::cluster::Cluster;
use crate::clustering::codebook::Codebook;
use crate::clustering::kmeans::{ClusteringError, ClusteringState, Clusterer, KMeansOptions};

/// Default number of worker threads.
pub const DEFAULT_NUM_THREADS: usize = 16;

/// Default capacity of the work queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// How long the producer waits on a full queue before checking again.
const SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Pool settings for [`ParallelKMeans`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelOptions {
    pub num_threads: usize,
    pub queue_capacity: usize,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            num_threads: DEFAULT_NUM_THREADS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// K-means engine that distributes each step across a worker pool.
///
/// Has the same external contract as [`crate::clustering::KMeans`]. Given the
/// same seed, training order and initial means both engines produce the same
/// means up to floating-point summation order.
#[derive(Debug)]
pub struct ParallelKMeans {
    state: ClusteringState,
    pool: ParallelOptions,
}

impl ParallelKMeans {
    pub fn new(num_clusters: usize) -> Self {
        Self::with_options(KMeansOptions::new(num_clusters), ParallelOptions::default())
    }

    pub fn with_seed(num_clusters: usize, seed: u64) -> Self {
        Self::with_options(
            KMeansOptions::new(num_clusters).with_seed(seed),
            ParallelOptions::default(),
        )
    }

    pub fn with_options(options: KMeansOptions, pool: ParallelOptions) -> Self {
        let pool = ParallelOptions {
            num_threads: pool.num_threads.max(1),
            queue_capacity: pool.queue_capacity.max(1),
        };
        Self {
            state: ClusteringState::new(&options),
            pool,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.pool.num_threads
    }
}

/// Runs one fork-join round.
///
/// The calling thread enqueues `units` and closes the queue; workers apply
/// `work` to every unit they dequeue and collect the produced values. All
/// workers are joined before returning. If any worker panics the round is
/// reported as failed and its partial results are discarded.
fn run_round<T, R, F>(
    pool: &ParallelOptions,
    phase: &'static str,
    units: impl IntoIterator<Item = T>,
    work: F,
) -> Result<Vec<R>, ClusteringError>
where
    T: Send,
    R: Send,
    F: Fn(T) -> Option<R> + Sync,
{
    let (sender, receiver) = bounded::<T>(pool.queue_capacity);
    let work = &work;

    thread::scope(|scope| {
        let workers: Vec<_> = (0..pool.num_threads)
            .map(|_| {
                let receiver = receiver.clone();
                scope.spawn(move || receiver.iter().filter_map(work).collect::<Vec<R>>())
            })
            .collect();
        drop(receiver);

        'produce: for unit in units {
            let mut pending = unit;
            loop {
                match sender.send_timeout(pending, SEND_TIMEOUT) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(unit)) => {
                        trace!("{phase} queue full, waiting for workers");
                        pending = unit;
                    }
                    // Every worker is gone; joining below reports why
                    Err(SendTimeoutError::Disconnected(_)) => break 'produce,
                }
            }
        }
        drop(sender);

        let mut results = Vec::new();
        let mut failed = 0;
        for worker in workers {
            match worker.join() {
                Ok(produced) => results.extend(produced),
                Err(_) => failed += 1,
            }
        }

        if failed > 0 {
            Err(ClusteringError::WorkerFailed { phase, failed })
        } else {
            Ok(results)
        }
    })
}

/// Orders `(index, value)` pairs produced by a round into a dense vector.
fn collect_indexed<V>(
    phase: &'static str,
    len: usize,
    produced: Vec<(usize, V)>,
) -> Result<Vec<V>, ClusteringError> {
    let mut slots: Vec<Option<V>> = (0..len).map(|_| None).collect();
    for (index, value) in produced {
        slots[index] = Some(value);
    }
    let missing = slots.iter().filter(|slot| slot.is_none()).count();
    if missing > 0 {
        return Err(ClusteringError::WorkerFailed {
            phase,
            failed: missing,
        });
    }
    Ok(slots.into_iter().flatten().collect())
}

impl Clusterer for ParallelKMeans {
    fn add_feature(&mut self, feature: Vec<f64>) -> Result<bool, ClusteringError> {
        self.state.add_feature(feature)
    }

    fn feature_count(&self) -> usize {
        self.state.features.len()
    }

    fn num_clusters(&self) -> usize {
        self.state.num_clusters()
    }

    fn init(&mut self) -> Result<(), ClusteringError> {
        self.state.init()
    }

    fn init_with_means(&mut self, means: Vec<Vec<f64>>) -> Result<(), ClusteringError> {
        self.state.init_with_means(means)
    }

    fn clustering_step(&mut self) -> Result<f64, ClusteringError> {
        self.state.ensure_initialized()?;
        self.state.reset_clusters();

        let feature_count = self.state.features.len();
        let cluster_count = self.state.clusters.len();

        {
            let state = &self.state;
            run_round(&self.pool, "assign", 0..feature_count, |index| {
                state.assign(index);
                None::<()>
            })?;
        }

        // Runs on the calling thread so the rescue draws stay deterministic
        let rescued = self.state.rescue_empty_clusters();
        if rescued > 0 {
            debug!("rescued {rescued} empty clusters");
        }

        let state = &self.state;
        let means = run_round(&self.pool, "recompute", 0..cluster_count, |index| {
            Some((index, state.next_mean(index)))
        })?;
        let means = collect_indexed("recompute", cluster_count, means)?;

        let stresses = {
            let means = &means;
            run_round(&self.pool, "stress", 0..cluster_count, |index| {
                Some((index, state.stress(index, &means[index])))
            })?
        };
        let stresses = collect_indexed("stress", cluster_count, stresses)?;

        Ok(self.state.apply_round(means, stresses))
    }

    fn clusters(&self) -> &[Cluster] {
        &self.state.clusters
    }

    fn inertia(&self) -> f64 {
        self.state.inertia()
    }

    fn into_codebook(self) -> Result<Codebook, ClusteringError> {
        self.state.into_codebook()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::KMeans;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn blobs(seed: u64, per_blob: usize) -> Vec<Vec<f64>> {
        let centers = [[0.0, 0.0, 0.0], [20.0, 0.0, 5.0], [0.0, 20.0, -5.0], [20.0, 20.0, 10.0]];
        let mut rng = StdRng::seed_from_u64(seed);
        let mut features = Vec::new();
        for _ in 0..per_blob {
            for center in &centers {
                features.push(
                    center
                        .iter()
                        .map(|c| c + rng.random_range(-1.0..1.0))
                        .collect(),
                );
            }
        }
        features
    }

    #[test]
    fn test_round_processes_every_unit_once() {
        let pool = ParallelOptions {
            num_threads: 4,
            queue_capacity: 3,
        };
        let mut produced = run_round(&pool, "test", 0..1000usize, Some).unwrap();
        produced.sort_unstable();
        assert_eq!(produced, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let pool = ParallelOptions {
            num_threads: 2,
            queue_capacity: 4,
        };
        let result = run_round(&pool, "assign", 0..100usize, |unit| {
            if unit == 50 {
                panic!("worker failure");
            }
            Some(unit)
        });
        assert!(matches!(
            result,
            Err(ClusteringError::WorkerFailed {
                phase: "assign",
                ..
            })
        ));
    }

    #[test]
    fn test_collect_indexed_detects_missing_results() {
        let result = collect_indexed("recompute", 3, vec![(0, 1.0), (2, 3.0)]);
        assert!(matches!(
            result,
            Err(ClusteringError::WorkerFailed { failed: 1, .. })
        ));
        let ordered = collect_indexed("recompute", 2, vec![(1, "b"), (0, "a")]).unwrap();
        assert_eq!(ordered, vec!["a", "b"]);
    }

    #[test]
    fn test_member_count_matches_training_set() {
        let features = blobs(1, 50);
        let mut kmeans = ParallelKMeans::with_options(
            KMeansOptions::new(4).with_seed(9),
            ParallelOptions {
                num_threads: 4,
                queue_capacity: 16,
            },
        );
        for feature in features.clone() {
            kmeans.add_feature(feature).unwrap();
        }
        kmeans.init().unwrap();
        let stress = kmeans.clustering_step().unwrap();

        assert!(stress >= 0.0);
        let total: usize = kmeans.clusters().iter().map(|c| c.size()).sum();
        assert_eq!(total, features.len());
    }

    #[test]
    fn test_matches_sequential_engine() {
        let features = blobs(2, 40);
        let mut sequential = KMeans::with_seed(4, 21);
        let mut parallel = ParallelKMeans::with_options(
            KMeansOptions::new(4).with_seed(21),
            ParallelOptions {
                num_threads: 8,
                queue_capacity: 32,
            },
        );
        for feature in &features {
            sequential.add_feature(feature.clone()).unwrap();
            parallel.add_feature(feature.clone()).unwrap();
        }
        sequential.init().unwrap();
        parallel.init().unwrap();

        for _ in 0..10 {
            let a = sequential.clustering_step().unwrap();
            let b = parallel.clustering_step().unwrap();
            assert!((a - b).abs() <= 1e-6 * a.abs().max(1.0));
        }

        for (s, p) in sequential.clusters().iter().zip(parallel.clusters()) {
            assert_eq!(s.size(), p.size());
            for (x, y) in s.mean().iter().zip(p.mean()) {
                assert!((x - y).abs() < 1e-9, "means differ: {x} vs {y}");
            }
        }
    }
}
