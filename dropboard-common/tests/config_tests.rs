//! Tests for bootstrap configuration loading
//!
//! Uses serial_test for every test touching DROPBOARD_CONFIG so environment
//! changes never race.

use dropboard_common::config::{Config, CONFIG_ENV_VAR};
use dropboard_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.port, 5780);
    assert_eq!(config.bind_host, "127.0.0.1");
    assert_eq!(config.room.default_name, "Poop Room");
    assert_eq!(config.room.code_attempts, 64);
    assert_eq!(config.analyzer.url, None);
    assert_eq!(config.analyzer.timeout_ms, 60_000);
    assert_eq!(config.logging.level, "info");
    assert!(config.database_path.ends_with("dropboard.db"));
}

#[test]
fn test_empty_file_means_defaults() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_file_overrides_only_given_keys() {
    let config = Config::from_toml_str(
        r#"
        port = 9000
        database_path = "/tmp/dropboard-test.db"

        [analyzer]
        url = "http://localhost:8088/analyze"
        "#,
    )
    .unwrap();

    assert_eq!(config.port, 9000);
    assert_eq!(config.database_path.to_string_lossy(), "/tmp/dropboard-test.db");
    assert_eq!(config.analyzer.url.as_deref(), Some("http://localhost:8088/analyze"));
    assert_eq!(config.analyzer.timeout_ms, 60_000);
    assert_eq!(config.room.code_attempts, 64);
}

#[test]
fn test_unknown_key_rejected() {
    let result = Config::from_toml_str("prot = 9000");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_zero_code_attempts_rejected() {
    let result = Config::from_toml_str("[room]\ncode_attempts = 0");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_zero_timeout_rejected() {
    let result = Config::from_toml_str("[analyzer]\ntimeout_ms = 0");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env() {
    let mut explicit = tempfile::NamedTempFile::new().unwrap();
    writeln!(explicit, "port = 6001").unwrap();
    let mut from_env = tempfile::NamedTempFile::new().unwrap();
    writeln!(from_env, "port = 6002").unwrap();

    env::set_var(CONFIG_ENV_VAR, from_env.path());
    let config = Config::load(Some(explicit.path())).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.port, 6001);
}

#[test]
#[serial]
fn test_env_path_used_when_no_explicit_path() {
    let mut from_env = tempfile::NamedTempFile::new().unwrap();
    writeln!(from_env, "port = 6002").unwrap();

    env::set_var(CONFIG_ENV_VAR, from_env.path());
    let config = Config::load(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.port, 6002);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let result = Config::load(Some(std::path::Path::new("/nonexistent/dropboard.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}
