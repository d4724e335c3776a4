//! Configuration loading tests.

use crosscall_config::{ConfigError, HostConfig, LogLevel, DEFAULT_MAX_CALL_DEPTH};
use std::io::Write;

#[test]
fn test_empty_document_yields_defaults() {
    let config = HostConfig::from_toml_str("").unwrap();
    assert_eq!(config, HostConfig::default());
    assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
}

#[test]
fn test_partial_sections_keep_remaining_defaults() {
    let config = HostConfig::from_toml_str(
        r#"
        max_call_depth = 4

        [gas]
        write_cost_flat = 5000
        gas_mul = 2

        [log]
        level = "debug"
        json = true

        [cache]
        base_dir = "/var/lib/host/cache"
        capabilities = ["staking", "stargate"]
        "#,
    )
    .unwrap();

    assert_eq!(config.max_call_depth, 4);
    assert_eq!(config.gas.write_cost_flat, 5000);
    assert_eq!(config.gas.read_cost_flat, 1000);
    assert_eq!(config.gas.delete_cost(), 2000);
    assert_eq!(config.log.level, LogLevel::Debug);
    assert!(config.log.json);
    assert_eq!(config.cache.capabilities, vec!["staking", "stargate"]);
    assert_eq!(config.cache.memory_cache_size_mib, 200);
}

#[test]
fn test_validation_rejects_zero_multiplier_and_depth() {
    let err = HostConfig::from_toml_str("[gas]\ngas_mul = 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = HostConfig::from_toml_str("max_call_depth = 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = HostConfig::from_toml_str("[cache]\nbase_dir = \"\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_malformed_document_is_a_parse_error() {
    let err = HostConfig::from_toml_str("max_call_depth = \"deep\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "print_debug = true\n[gas]\niter_next_cost_flat = 7").unwrap();

    let config = HostConfig::load(file.path()).unwrap();
    assert!(config.print_debug);
    assert_eq!(config.gas.iter_next_cost(), 7);
}

#[test]
fn test_load_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    match HostConfig::load(&path) {
        Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_config_serializes_to_json() {
    let json = serde_json::to_value(HostConfig::default()).unwrap();
    assert_eq!(json["gas"]["write_cost_per_byte"], 30);
    assert_eq!(json["log"]["level"], "info");
}
