//! Tests for queue configuration.

use super::*;
use std::io::Write;

#[test]
fn test_default_config() {
    let config = MemoryQueueConfig::default();
    assert_eq!(config.name, "memory");
    assert_eq!(config.listen_poll_interval(), Duration::from_secs(1));
    assert_eq!(config.listen_receive_timeout(), Duration::from_secs(1));
    assert!(config.validate().is_ok());
}

#[test]
fn test_named_config_keeps_default_timings() {
    let config = MemoryQueueConfig::named("orders");
    assert_eq!(config.name, "orders");
    assert_eq!(config.listen_poll_interval_ms, 1000);
}

#[test]
fn test_validate_rejects_bad_name() {
    let config = MemoryQueueConfig::named("bad name");
    assert!(matches!(
        config.validate(),
        Err(ConfigurationError::Invalid { .. })
    ));
}

#[test]
fn test_validate_rejects_zero_intervals() {
    let mut config = MemoryQueueConfig::default();
    config.listen_poll_interval_ms = 0;
    assert!(config.validate().is_err());

    let mut config = MemoryQueueConfig::default();
    config.listen_receive_timeout_ms = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_load_from_toml_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "name = \"orders\"").unwrap();
    writeln!(file, "listen_poll_interval_ms = 250").unwrap();

    let config = MemoryQueueConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.name, "orders");
    assert_eq!(config.listen_poll_interval_ms, 250);
    // Missing fields keep their defaults
    assert_eq!(config.listen_receive_timeout_ms, 1000);
}

#[test]
fn test_load_from_json_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"name": "events", "listen_receive_timeout_ms": 50}}"#).unwrap();

    let config = MemoryQueueConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.name, "events");
    assert_eq!(config.listen_receive_timeout_ms, 50);
}

#[test]
fn test_load_rejects_invalid_values() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "listen_poll_interval_ms = 0").unwrap();

    assert!(matches!(
        MemoryQueueConfig::load(Some(file.path())),
        Err(ConfigurationError::Invalid { .. })
    ));
}

#[test]
fn test_load_missing_file_fails() {
    let result = MemoryQueueConfig::load(Some(Path::new("/nonexistent/memqueue.toml")));
    assert!(matches!(result, Err(ConfigurationError::Parsing { .. })));
}

#[test]
fn test_connection_params_are_plain_key_values() {
    let connection = ConnectionParams::new()
        .with("uri", "memory://local")
        .with("host", "localhost");

    assert_eq!(connection.uri(), Some("memory://local"));
    assert_eq!(connection.get("host"), Some("localhost"));
    assert_eq!(connection.get("port"), None);
}

#[test]
fn test_credential_debug_hides_values() {
    let credential = CredentialParams::new()
        .with("username", "admin")
        .with("password", "hunter2");

    let rendered = format!("{:?}", credential);
    assert!(rendered.contains("password"));
    assert!(!rendered.contains("hunter2"));
    assert_eq!(credential.get("username"), Some("admin"));
}
