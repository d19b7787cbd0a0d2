//! Test: settings template and section conversions

use simdex::Settings;
use simdex::hashing::BitSamplingBank;
use tempfile::TempDir;

#[test]
fn test_initialized_settings_drive_every_subsystem() {
    let temp_dir = TempDir::new().unwrap();
    let path = Settings::init_config_file_in(temp_dir.path(), false).unwrap();
    assert!(path.ends_with(".simdex/settings.toml"));

    let mut settings = Settings::load_from(&path).unwrap();
    settings.bit_sampling.dimensions = 8;
    settings.bit_sampling.num_function_bundles = 4;

    let bank = BitSamplingBank::generate(&settings.bit_sampling.params(), Some(1)).unwrap();
    assert_eq!(bank.bits(), 12);

    let metric = settings.metric_spaces_options();
    assert_eq!(metric.num_reference_objects, 500);
    assert_eq!(metric.num_reference_objects_used, 50);

    let vocabulary = settings.clustering.vocabulary_options();
    assert_eq!(vocabulary.sample_documents, 500);
    assert_eq!(vocabulary.policy.max_iterations, 100);
    assert_eq!(settings.aggregation.vlad().quantization_levels(), 16);
}

#[test]
fn test_saved_settings_reload() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");

    let mut settings = Settings::default();
    settings.lsh.num_function_bundles = 12;
    settings.clustering.num_clusters = vec![16, 64];
    settings.save(&path).unwrap();

    let loaded = Settings::load_from(&path).unwrap();
    assert_eq!(loaded.lsh.params().num_function_bundles, 12);
    assert_eq!(loaded.clustering.num_clusters, vec![16, 64]);
}
