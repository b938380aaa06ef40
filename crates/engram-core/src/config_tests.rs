//! Tests for `config` module

use super::config::*;
use crate::distance::DistanceMetric;

#[test]
fn test_default_config_is_valid() {
    let config = EngramConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.engine.dimension, 384);
    assert_eq!(config.engine.metric, DistanceMetric::Euclidean);
}

#[test]
fn test_from_toml_overrides() {
    let toml = r#"
        [engine]
        dimension = 128
        capacity = 500
        metric = "cosine"

        [decay]
        interval_secs = 5
        decay_rate = 0.8
    "#;

    let config = EngramConfig::from_toml(toml).unwrap();
    assert_eq!(config.engine.dimension, 128);
    assert_eq!(config.engine.capacity, 500);
    assert_eq!(config.engine.metric, DistanceMetric::Cosine);
    assert_eq!(config.decay.interval_secs, 5);
    assert!((config.decay.decay_rate - 0.8).abs() < 1e-6);

    // Untouched sections keep defaults
    assert_eq!(config.graph.max_connections, 16);
    assert!((config.filters.bloom_fpr - 0.01).abs() < 1e-9);
}

#[test]
fn test_invalid_dimension_rejected() {
    let mut config = EngramConfig::default();
    config.engine.dimension = 0;

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("engine.dimension"));
}

#[test]
fn test_invalid_decay_rate_rejected() {
    let mut config = EngramConfig::default();
    config.decay.decay_rate = 1.5;
    assert!(config.validate().is_err());

    config.decay.decay_rate = 0.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_bloom_fpr_rejected() {
    let mut config = EngramConfig::default();
    config.filters.bloom_fpr = 0.0;
    assert!(config.validate().is_err());

    config.filters.bloom_fpr = 1.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_invalid_logging_level_rejected() {
    let mut config = EngramConfig::default();
    config.logging.level = "verbose".to_string();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("logging.level"));
}

#[test]
fn test_toml_round_trip() {
    let config = EngramConfig::default();
    let toml = config.to_toml().unwrap();
    let parsed = EngramConfig::from_toml(&toml).unwrap();

    assert_eq!(parsed.engine.dimension, config.engine.dimension);
    assert_eq!(parsed.lsh.tables, config.lsh.tables);
    assert_eq!(parsed.graph.ef_search, config.graph.ef_search);
}

#[test]
fn test_load_from_missing_file_uses_defaults() {
    let config = EngramConfig::load_from_path("/nonexistent/engram.toml").unwrap();
    assert_eq!(config.engine.capacity, 100_000);
}

#[test]
fn test_load_from_file() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engram.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[engine]\ncapacity = 42").unwrap();

    let config = EngramConfig::load_from_path(&path).unwrap();
    assert_eq!(config.engine.capacity, 42);
}
