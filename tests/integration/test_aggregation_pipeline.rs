//! Test: vocabulary training followed by corpus aggregation
//!
//! Items carry variable-length local feature lists; after aggregation every
//! item has fixed-length BOVW and VLAD fields per vocabulary.

use std::sync::Arc;

use crate::common::blobs;
use simdex::aggregate::{AggregationError, aggregate_field_name};
use simdex::clustering::{
    ConvergencePolicy, ParallelOptions, VocabularyBuilder, VocabularyOptions,
};
use simdex::{Bovw, CorpusAggregator, ItemStore, MemoryItemStore, Vlad};
use tempfile::TempDir;

const DIMENSION: usize = 3;

fn corpus() -> MemoryItemStore {
    let store = MemoryItemStore::new();
    let centers = [
        vec![0.0, 0.0, 0.0],
        vec![10.0, 0.0, 0.0],
        vec![0.0, 10.0, 0.0],
        vec![0.0, 0.0, 10.0],
    ];
    for item in 0..40u64 {
        // 4, 8 or 12 local features per item
        let per_center = 1 + (item % 3) as usize;
        store.add_local(blobs(&centers, per_center, 0.5, item));
    }
    store
}

#[test]
fn test_bovw_and_vlad_fields_have_fixed_length() {
    let temp_dir = TempDir::new().unwrap();
    let store = corpus();
    let short_item = store.add_local(vec![vec![1.0, 1.0, 1.0]]);
    let global_only = store.add_global(vec![1.0, 2.0]);

    let built = VocabularyBuilder::new(
        &store,
        VocabularyOptions {
            num_clusters: vec![4],
            sample_documents: 20,
            policy: ConvergencePolicy::default(),
            pool: ParallelOptions {
                num_threads: 2,
                queue_capacity: 32,
            },
            seed: Some(6),
        },
    )
    .build(temp_dir.path())
    .unwrap();
    let codebooks: Vec<_> = built.into_iter().map(|b| Arc::new(b.codebook)).collect();
    let k = codebooks[0].len();

    let report = CorpusAggregator::new(&store, "local", codebooks)
        .with_aggregator(Bovw)
        .with_aggregator(Vlad::default())
        .run()
        .unwrap();

    assert_eq!(report.aggregated, 40);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, short_item);
    assert!(matches!(
        report.failed[0].1,
        AggregationError::TooFewFeatures { features: 1, clusters: 4 }
    ));
    assert!(store.field(short_item, &aggregate_field_name("local", "bovw", k)).is_none());
    assert!(store.field(global_only, &aggregate_field_name("local", "vlad", k)).is_none());

    for id in store.live_ids() {
        let features = store.local_features(id).unwrap_or_default();
        if features.is_empty() || id == short_item {
            continue;
        }
        let bovw = store
            .field(id, &aggregate_field_name("local", "bovw", k))
            .unwrap();
        assert_eq!(bovw.as_tokens().unwrap().len(), features.len());

        let vlad = store
            .field(id, &aggregate_field_name("local", "vlad", k))
            .unwrap();
        assert_eq!(vlad.as_bytes().unwrap().len(), k * DIMENSION * 8);
    }
}

#[test]
fn test_unquantized_vlad_is_unit_length() {
    let temp_dir = TempDir::new().unwrap();
    let store = corpus();
    let built = VocabularyBuilder::new(
        &store,
        VocabularyOptions {
            num_clusters: vec![4],
            sample_documents: 40,
            seed: Some(8),
            ..VocabularyOptions::default()
        },
    )
    .build(temp_dir.path())
    .unwrap();
    let codebook = &built[0].codebook;

    let features = store.local_features(store.live_ids()[5]).unwrap();
    let vector = Vlad::unquantized().vector(codebook, &features).unwrap();
    assert_eq!(vector.len(), 4 * DIMENSION);
    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    assert!((norm - 1.0).abs() < 1e-9 || norm == 0.0);

    let histogram = Bovw.histogram(codebook, &features).unwrap();
    assert_eq!(histogram.iter().sum::<u32>() as usize, features.len());
}
