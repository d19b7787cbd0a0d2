//! Test: metric-space index over a synthetic corpus
//!
//! Uses the default generation sizes (500 reference objects, rank lists of
//! 50) on a corpus of 600 items.

use crate::common::{global_store, random_vectors};
use simdex::metric::{
    IndexState, MetricIndexError, MetricSpacesIndex, MetricSpacesOptions, RANK_LIST_FIELD,
    RankList, max_footrule,
};
use simdex::{ItemId, ItemStore, MemoryItemStore};
use tempfile::TempDir;

fn options() -> MetricSpacesOptions {
    MetricSpacesOptions {
        num_reference_objects: 500,
        num_reference_objects_used: 50,
        num_hits: 100,
        parallel_threads: 4,
        seed: Some(2024),
    }
}

#[test]
fn test_item_is_its_own_best_match() {
    let temp_dir = TempDir::new().unwrap();
    let vectors = random_vectors(600, 8, 1.0, 31);
    let query = vectors[7].clone();
    let store = global_store(vectors);

    let mut index = MetricSpacesIndex::new(temp_dir.path(), options());
    assert_eq!(index.create_index(&store).unwrap(), 600);
    assert_eq!(index.references().map(|r| r.len()), Some(500));

    let hits = index.search(&query).unwrap();
    assert_eq!(hits.len(), 100);
    assert_eq!(hits[0].item, ItemId::new(7));
    assert_eq!(hits[0].score, max_footrule(50) as f64);
    assert_eq!(hits[0].score, 2450.0);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

    // Stored field and in-memory list agree
    let tokens = store.field(ItemId::new(7), RANK_LIST_FIELD).unwrap();
    let stored = RankList::from_tokens(tokens.as_tokens().unwrap()).unwrap();
    assert_eq!(stored.len(), 50);
    assert_eq!(Some(&stored), index.rank_list(ItemId::new(7)));
    assert_eq!(index.search_item(ItemId::new(7)).unwrap(), hits);
}

#[test]
fn test_reopened_index_answers_identically() {
    let temp_dir = TempDir::new().unwrap();
    let store = global_store(random_vectors(600, 8, 1.0, 32));
    let mut index = MetricSpacesIndex::new(temp_dir.path(), options());
    index.create_index(&store).unwrap();

    let reopened = MetricSpacesIndex::open(temp_dir.path(), options(), &store).unwrap();
    assert_eq!(reopened.state(), IndexState::Ready);
    assert_eq!(reopened.len(), 600);

    let query = vec![0.1, -0.2, 0.3, 0.0, 0.5, -0.5, 0.25, 0.9];
    assert_eq!(index.search(&query).unwrap(), reopened.search(&query).unwrap());
}

#[test]
fn test_update_indexes_only_new_items() {
    let temp_dir = TempDir::new().unwrap();
    let store = global_store(random_vectors(600, 8, 1.0, 33));
    let mut index = MetricSpacesIndex::new(temp_dir.path(), options());
    index.create_index(&store).unwrap();

    let added = store.add_global(vec![0.0; 8]);
    store.add_global(vec![0.0; 3]);
    assert_eq!(index.update_index(&store).unwrap(), 1);
    assert_eq!(index.update_index(&store).unwrap(), 0);
    assert!(index.rank_list(added).is_some());
}

#[test]
fn test_small_corpus_is_a_configuration_error() {
    let temp_dir = TempDir::new().unwrap();
    let store: MemoryItemStore = global_store(random_vectors(120, 8, 1.0, 34));
    let mut index = MetricSpacesIndex::new(temp_dir.path(), options());

    assert!(matches!(
        index.create_index(&store),
        Err(MetricIndexError::CorpusTooSmall {
            items: 120,
            required: 500
        })
    ));
    assert_eq!(index.state(), IndexState::Uninitialized);

    let mut invalid = options();
    invalid.num_reference_objects_used = 501;
    let mut index = MetricSpacesIndex::new(temp_dir.path(), invalid);
    assert!(matches!(
        index.create_index(&store),
        Err(MetricIndexError::InvalidReferenceCounts {
            used: 501,
            total: 500
        })
    ));
}

#[test]
fn test_create_skips_deleted_and_featureless_items() {
    let temp_dir = TempDir::new().unwrap();
    let store = global_store(random_vectors(605, 8, 1.0, 35));
    for id in 0..5 {
        store.delete(ItemId::new(id));
    }
    let local_only = store.add_local(vec![vec![0.5; 8]]);

    let mut index = MetricSpacesIndex::new(temp_dir.path(), options());
    assert_eq!(index.create_index(&store).unwrap(), 600);
    assert_eq!(index.len(), 600);
    for id in (0..5).map(ItemId::new).chain([local_only]) {
        assert!(index.rank_list(id).is_none());
        assert!(store.field(id, RANK_LIST_FIELD).is_none());
    }
    let references = index.references().unwrap();
    assert!(
        (0..references.len())
            .all(|r| references.item(r as u32).is_some_and(|id| id.get() >= 5))
    );
}

#[test]
fn test_update_follows_deletes_and_changes() {
    let temp_dir = TempDir::new().unwrap();
    let vectors = random_vectors(600, 8, 1.0, 36);
    let deleted_query = vectors[7].clone();
    let moved = vectors[42].clone();
    let store = global_store(vectors);
    let mut index = MetricSpacesIndex::new(temp_dir.path(), options());
    index.create_index(&store).unwrap();

    store.delete(ItemId::new(7));
    store
        .update(ItemId::new(11), Some(moved.clone()), Vec::new())
        .unwrap();
    assert_eq!(index.update_index(&store).unwrap(), 1);
    assert_eq!(index.update_index(&store).unwrap(), 0);
    assert_eq!(index.len(), 599);

    let hits = index.search(&deleted_query).unwrap();
    assert!(hits.iter().all(|hit| hit.item != ItemId::new(7)));
    assert!(matches!(
        index.search_item(ItemId::new(7)),
        Err(MetricIndexError::NotIndexed(_))
    ));

    // The changed item now ranks exactly like the item it was moved onto
    let hits = index.search(&moved).unwrap();
    assert_eq!(hits[0].item, ItemId::new(11));
    assert_eq!(hits[1].item, ItemId::new(42));
    assert_eq!(hits[0].score, 2450.0);
    assert_eq!(hits[1].score, 2450.0);
    assert!(store.field(ItemId::new(11), RANK_LIST_FIELD).is_some());

    // A reopened index sees the same corpus
    let reopened = MetricSpacesIndex::open(temp_dir.path(), options(), &store).unwrap();
    assert_eq!(reopened.len(), 599);
    assert_eq!(reopened.search(&moved).unwrap(), hits);
}
