//! Test: k-means training on synthetic blobs
//!
//! Both engines must recover well separated centers and agree with each
//! other when started from the same seed.

use crate::common::{blobs, closest_distance};
use simdex::clustering::{
    Clusterer, ClusteringError, ConvergencePolicy, KMeans, KMeansOptions, ParallelKMeans,
    ParallelOptions, train, train_with_restarts,
};

fn centers() -> Vec<Vec<f64>> {
    vec![vec![0.0, 0.0], vec![10.0, 10.0], vec![-10.0, 10.0]]
}

#[test]
fn test_three_blobs_are_recovered() {
    let points = blobs(&centers(), 60, 1.0, 5);
    let policy = ConvergencePolicy::default().with_stress_floor(1e-6);

    let (kmeans, report) = train_with_restarts(40, &policy, |attempt| {
        let mut kmeans = KMeans::with_seed(3, 100 + attempt as u64);
        for point in &points {
            kmeans.add_feature(point.clone())?;
        }
        Ok::<_, ClusteringError>(kmeans)
    })
    .unwrap();

    assert!(report.converged);
    let means: Vec<&[f64]> = kmeans.clusters().iter().map(|c| c.mean()).collect();
    for center in centers() {
        let distance = closest_distance(&center, means.iter().copied());
        assert!(distance < 0.5, "center {center:?} is {distance} from every mean");
    }
    let members: usize = kmeans.clusters().iter().map(|c| c.size()).sum();
    assert_eq!(members, points.len());
}

fn nine_points() -> Vec<Vec<f64>> {
    vec![
        vec![0.0, 0.0],
        vec![0.2, -0.1],
        vec![-0.1, 0.2],
        vec![5.0, 5.0],
        vec![5.1, 4.9],
        vec![4.8, 5.2],
        vec![10.0, 10.0],
        vec![10.2, 9.9],
        vec![9.9, 10.1],
    ]
}

fn assert_near_centers(clusters: &[simdex::clustering::Cluster]) {
    let means: Vec<&[f64]> = clusters.iter().map(|c| c.mean()).collect();
    for center in [[0.0, 0.0], [5.0, 5.0], [10.0, 10.0]] {
        let distance = closest_distance(&center, means.iter().copied());
        assert!(distance < 0.5, "center {center:?} is {distance} from every mean");
    }
    assert!(clusters.iter().all(|c| c.size() == 3));
}

#[test]
fn test_nine_points_train_to_three_centers() {
    let policy = ConvergencePolicy::default().with_stress_floor(1e-9);

    let (kmeans, report) = train_with_restarts(40, &policy, |attempt| {
        let mut kmeans = KMeans::with_seed(3, attempt as u64);
        for point in nine_points() {
            kmeans.add_feature(point)?;
        }
        Ok::<_, ClusteringError>(kmeans)
    })
    .unwrap();
    assert!(report.converged);
    assert!(report.iterations <= 100);
    assert_near_centers(kmeans.clusters());

    let (parallel, _) = train_with_restarts(40, &policy, |attempt| {
        let mut kmeans = ParallelKMeans::with_seed(3, 500 + attempt as u64);
        for point in nine_points() {
            kmeans.add_feature(point)?;
        }
        Ok::<_, ClusteringError>(kmeans)
    })
    .unwrap();
    assert_near_centers(parallel.clusters());
}

#[test]
fn test_parallel_engine_matches_sequential() {
    let points = blobs(
        &[vec![0.0, 0.0, 0.0], vec![6.0, 0.0, 1.0], vec![0.0, 7.0, -3.0], vec![5.0, 5.0, 5.0]],
        40,
        1.5,
        9,
    );

    let mut sequential = KMeans::with_seed(4, 77);
    let mut parallel = ParallelKMeans::with_options(
        KMeansOptions::new(4).with_seed(77),
        ParallelOptions {
            num_threads: 4,
            queue_capacity: 8,
        },
    );
    for point in &points {
        sequential.add_feature(point.clone()).unwrap();
        parallel.add_feature(point.clone()).unwrap();
    }
    sequential.init().unwrap();
    parallel.init().unwrap();

    for _ in 0..12 {
        let a = sequential.clustering_step().unwrap();
        let b = parallel.clustering_step().unwrap();
        assert!((a - b).abs() < 1e-6);
    }

    for (s, p) in sequential.clusters().iter().zip(parallel.clusters()) {
        assert_eq!(s.size(), p.size());
        for (x, y) in s.mean().iter().zip(p.mean()) {
            assert!((x - y).abs() < 1e-9);
        }
    }
}

#[test]
fn test_training_stops_at_iteration_cap() {
    let points = blobs(&centers(), 30, 4.0, 3);
    let mut kmeans = ParallelKMeans::with_seed(3, 1);
    for point in points {
        kmeans.add_feature(point).unwrap();
    }

    let policy = ConvergencePolicy {
        stress_floor: 0.0,
        stress_scale: f64::INFINITY,
        max_iterations: 2,
    };
    let report = train(&mut kmeans, &policy).unwrap();
    assert_eq!(report.iterations, 2);
    assert!(!report.converged);
}

#[test]
fn test_too_few_vectors_is_a_recoverable_error() {
    let mut kmeans = ParallelKMeans::with_seed(8, 1);
    for i in 0..5 {
        kmeans.add_feature(vec![i as f64]).unwrap();
    }
    let result = train(&mut kmeans, &ConvergencePolicy::default());
    assert!(matches!(
        result,
        Err(ClusteringError::TooFewFeatures {
            features: 5,
            clusters: 8
        })
    ));
}
