//! Integration tests for config module

use super::*;
use crate::mutual_info::{Estimator, KMeansParams, Method, Schedule};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_end_to_end_config_loading() {
    let yaml = r#"
method: quantile
estimate_size: 2000
compression_range: [0.4, 0.95]
n_bins_default: 16
max_trials_adjust: 6
parallel: false
debug: true

listen_schedule:
  start_epoch: 1
  batch_interval: 5

dispersion_schedule:
  epoch_interval: 2

kmeans:
  seed: 7
  iterations: 50
"#;

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(yaml.as_bytes()).unwrap();

    let config = load_config(temp_file.path()).unwrap();

    assert_eq!(config.method, Method::Quantile);
    assert_eq!(config.estimate_size, Some(2000));
    assert_eq!(config.compression_range, [0.4, 0.95]);
    assert_eq!(config.n_bins_default, 16);
    assert_eq!(config.max_trials_adjust, 6);
    assert!(!config.parallel);
    assert!(config.debug);
    assert_eq!(
        config.listen_schedule,
        Schedule::every_batches(5).starting_epoch(1)
    );
    assert_eq!(config.dispersion_schedule, Schedule::every_epochs(2));
    assert_eq!(config.kmeans.seed, 7);
    assert_eq!(config.kmeans.iterations, 50);
    assert_eq!(config.kmeans.batch_size, 256); // Default
}

#[test]
fn test_minimal_config() {
    let config = from_yaml_str("method: knn\n").unwrap();

    // Check defaults are applied
    assert_eq!(config.method, Method::Knn);
    assert_eq!(config.estimate_size, None);
    assert_eq!(config.compression_range, [0.5, 0.999]);
    assert_eq!(config.n_bins_default, 20);
    assert_eq!(config.max_trials_adjust, 10);
    assert!(config.parallel);
    assert_eq!(config.listen_schedule, Schedule::every_batches(5));
    assert_eq!(config.estimator(), Estimator::Knn { k: 3 });
}

#[test]
fn test_empty_document_uses_defaults() {
    let config = from_yaml_str("{}").unwrap();
    assert_eq!(config, MutualInfoConfig::default());
    assert_eq!(config.estimator(), Estimator::Histogram);
}

#[test]
fn test_unknown_method_rejected() {
    let err = from_yaml_str("method: wavelet\n").unwrap_err();
    assert!(err.to_string().contains("Failed to parse YAML config"));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let err = from_yaml_str("n_bins_default: 1\n").unwrap_err();
    assert!(err.to_string().contains("Invalid config"));
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/infoplane.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_save_and_reload() {
    let config = MutualInfoConfig::new(Method::Kmeans)
        .with_estimate_size(500)
        .with_listen_schedule(Schedule::every_epochs(3));

    let temp_file = NamedTempFile::new().unwrap();
    save_config(&config, temp_file.path()).unwrap();

    assert_eq!(load_config(temp_file.path()).unwrap(), config);
}

#[test]
fn test_quantizer_carries_settings() {
    let config = MutualInfoConfig::new(Method::FixedFlat).with_estimate_size(64);
    let quantizer = config.quantizer();
    assert_eq!(quantizer.method(), Method::FixedFlat);
    assert_eq!(quantizer.estimate_size(), Some(64));
}

#[test]
fn test_builders_set_their_fields() {
    let kmeans = KMeansParams {
        seed: 3,
        batch_size: 32,
        iterations: 12,
    };
    let config = MutualInfoConfig::new(Method::Quantile)
        .with_estimate_size(500)
        .with_compression_range(0.3, 0.9)
        .with_bin_search(8, 4)
        .with_knn_neighbors(5)
        .with_kmeans(kmeans)
        .with_parallel(false)
        .with_debug(true)
        .with_listen_schedule(Schedule::every_batches(10))
        .with_dispersion_schedule(Schedule::every_epochs(2));

    assert_eq!(config.estimate_size, Some(500));
    assert_eq!(config.compression_range, [0.3, 0.9]);
    assert_eq!((config.n_bins_default, config.max_trials_adjust), (8, 4));
    assert_eq!(config.knn_neighbors, 5);
    assert_eq!(config.kmeans, kmeans);
    assert!(!config.parallel);
    assert!(config.debug);
    assert_eq!(config.listen_schedule, Schedule::every_batches(10));
    assert_eq!(config.dispersion_schedule, Schedule::every_epochs(2));
    assert!(validate_config(&config).is_ok());
}
