//! Test: codebook training, persistence and vocabulary building

use crate::common::blobs;
use simdex::clustering::{
    Clusterer, Codebook, ConvergencePolicy, KMeans, ParallelOptions, VocabularyBuilder,
    VocabularyOptions, codebook_file_name, train,
};
use simdex::{CodecError, ItemId, MemoryItemStore};
use tempfile::TempDir;

#[test]
fn test_trained_codebook_round_trips_exactly() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("codebook-4.dat");

    let mut kmeans = KMeans::with_seed(4, 8);
    for point in blobs(&[vec![1.0, 1.0, 1.0], vec![-4.0, 2.0, 0.5]], 25, 2.0, 4) {
        kmeans.add_feature(point).unwrap();
    }
    train(&mut kmeans, &ConvergencePolicy::default()).unwrap();
    let codebook = kmeans.into_codebook().unwrap();
    codebook.write_clusters(&path).unwrap();

    // 2 header ints + 4 * 3 doubles
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 8 + 4 * 3 * 8);

    let loaded = Codebook::read_clusters(&path).unwrap();
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded.dimension(), 3);
    for (a, b) in codebook.means().zip(loaded.means()) {
        assert_eq!(a, b);
    }
}

#[test]
fn test_truncated_files_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("codebook.dat");
    let codebook = Codebook::from_means(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    codebook.write_clusters(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();

    std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
    match Codebook::read_clusters(&path) {
        Err(CodecError::LengthMismatch {
            expected, actual, ..
        }) => {
            assert_eq!(expected, bytes.len());
            assert_eq!(actual, bytes.len() - 3);
        }
        other => panic!("expected a length mismatch, got {other:?}"),
    }

    std::fs::write(&path, &bytes[..6]).unwrap();
    assert!(matches!(
        Codebook::read_clusters(&path),
        Err(CodecError::Truncated { .. })
    ));

    assert!(matches!(
        Codebook::read_clusters(&temp_dir.path().join("missing.dat")),
        Err(CodecError::Io { .. })
    ));
}

#[test]
fn test_vocabulary_builder_writes_every_size() {
    let temp_dir = TempDir::new().unwrap();
    let store = MemoryItemStore::new();
    let centers = [vec![0.0, 0.0], vec![20.0, 0.0], vec![0.0, 20.0], vec![20.0, 20.0]];
    for item in 0..30u64 {
        store.add_local(blobs(&centers, 2, 1.0, item));
    }
    store.delete(ItemId::new(0));

    let builder = VocabularyBuilder::new(
        &store,
        VocabularyOptions {
            num_clusters: vec![2, 4],
            sample_documents: 10,
            policy: ConvergencePolicy::default(),
            pool: ParallelOptions {
                num_threads: 3,
                queue_capacity: 16,
            },
            seed: Some(11),
        },
    );
    assert_eq!(builder.sample_features().len(), 10 * 8);

    let built = builder.build(temp_dir.path()).unwrap();
    assert_eq!(built.len(), 2);
    for entry in &built {
        assert_eq!(entry.path, temp_dir.path().join(codebook_file_name(entry.num_clusters)));
        let loaded = Codebook::read_clusters(&entry.path).unwrap();
        assert_eq!(loaded.len(), entry.num_clusters);
        assert_eq!(loaded.dimension(), 2);
    }
}
