//! Unit tests for configuration resolution and graceful degradation
//!
//! Tests:
//! - Missing TOML files do not cause termination
//! - Priority order for config file resolution (CLI → ENV → user → system)
//! - Broken files are reported instead of silently ignored
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SUNPLAN_CONFIG are marked with #[serial].

use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use sunplan_common::config::{
    load_config, load_toml_config, ConfigResolver, ProviderKind, TomlConfig, CONFIG_ENV_VAR,
};
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_argument_takes_precedence() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/sunplan-from-env.toml");

    let resolver = ConfigResolver::new("sunplan");
    let resolved = resolver.resolve(Some(Path::new("/tmp/sunplan-from-cli.toml")));

    assert_eq!(resolved, Some(PathBuf::from("/tmp/sunplan-from-cli.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/sunplan-from-env.toml");

    let resolver = ConfigResolver::new("sunplan");
    let resolved = resolver.resolve(None);

    assert_eq!(resolved, Some(PathBuf::from("/tmp/sunplan-from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_config_file_uses_defaults() {
    env::remove_var(CONFIG_ENV_VAR);

    // App name that certainly has no user or system file
    let resolver = ConfigResolver::new("sunplan-nonexistent-test-12345");
    let resolved = resolver.resolve(None);
    assert_eq!(resolved, None);

    let config = load_config(resolved.as_deref()).unwrap();
    assert_eq!(config.server.port, 5790);
    assert_eq!(config.inference.attempts_per_model, 3);
}

#[test]
fn test_nonexistent_explicit_path_degrades_to_defaults() {
    let config = load_config(Some(Path::new("/tmp/sunplan-does-not-exist-98765.toml"))).unwrap();
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_full_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = TomlConfig::default();
    config.server.port = 8088;
    config.inference.retry_delay_ms = 250;
    config.region.electricity_rate = 0.21;
    fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded.server.port, 8088);
    assert_eq!(loaded.inference.retry_delay_ms, 250);
    assert_eq!(loaded.region.electricity_rate, 0.21);
    assert_eq!(loaded.inference.providers.len(), 2);
}

#[test]
fn test_provider_list_order_preserved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
        [[inference.providers]]
        name = "local"
        kind = "openai_compatible"
        base_url = "http://localhost:11434/v1"
        models = ["llava:13b", "llava:7b"]

        [[inference.providers]]
        name = "gemini"
        kind = "gemini"
        api_key_env = "MY_GEMINI_KEY"
        models = ["gemini-2.0-flash"]
        "#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    let names: Vec<_> = config.inference.providers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["local", "gemini"]);
    assert_eq!(config.inference.providers[0].kind, ProviderKind::OpenaiCompatible);
    assert_eq!(config.inference.providers[0].models, vec!["llava:13b", "llava:7b"]);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server\nport = \"not a number\"").unwrap();

    assert!(load_config(Some(&path)).is_err());
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
        [region]
        degradation_rate = 1.5
        "#,
    )
    .unwrap();

    assert!(load_toml_config(&path).is_err());
}
