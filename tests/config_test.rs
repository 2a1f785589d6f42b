//! Tests for config module

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use lineup::config::Config;
use lineup::models::{HOUR_MS, MINUTE_MS};
use serial_test::serial;
use tempfile::NamedTempFile;

const ENV_VARS: &[&str] = &[
    "LINEUP_FILLER_REPEAT_COOLDOWN_MS",
    "LINEUP_DEFAULT_BUFFER_DAYS",
    "LINEUP_MAX_LINEUP_ITEMS",
    "LINEUP_SQLITE_PATH",
    "LINEUP_MAINTENANCE_INTERVAL_SECS",
    "LINEUP_LOW_WATER_HOURS",
    "LINEUP_RETENTION_HOURS",
    "LINEUP_MAX_CONCURRENCY",
    "LINEUP_LOG_LEVEL",
    "LINEUP_LOG_FORMAT",
];

fn clear_env() {
    for name in ENV_VARS {
        std::env::remove_var(name);
    }
}

#[test]
fn test_config_file_exists() {
    let config_path = Path::new("config.toml");
    assert!(
        config_path.exists(),
        "config.toml should exist in project root"
    );
}

#[test]
fn test_shipped_config_matches_defaults() {
    let config = Config::from_file(Path::new("config.toml")).expect("config.toml should parse");
    config.validate().expect("config.toml should be valid");
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_from_temp_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[engine]
filler_repeat_cooldown_ms = 600000

[storage]
sqlite_path = "/tmp/other.db"

[logging]
format = "json"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.engine.filler_repeat_cooldown_ms, 10 * MINUTE_MS);
    assert_eq!(config.storage.sqlite_path, Path::new("/tmp/other.db"));
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.logging.level, "info");
    assert!(config.validate().is_ok());
}

#[test]
fn test_malformed_file_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[engine\ndefault_buffer_days = ").unwrap();
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));

    assert!(Config::from_file(Path::new("does/not/exist.toml")).is_err());
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = Config::from_env().unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var("LINEUP_DEFAULT_BUFFER_DAYS", "5");
    std::env::set_var("LINEUP_SQLITE_PATH", "/var/lib/lineup/db.sqlite");
    std::env::set_var("LINEUP_MAINTENANCE_INTERVAL_SECS", "30");
    std::env::set_var("LINEUP_LOW_WATER_HOURS", "6");
    std::env::set_var("LINEUP_LOG_FORMAT", "json");
    // Malformed numbers fall back to the default
    std::env::set_var("LINEUP_MAX_CONCURRENCY", "many");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.engine.default_buffer_days, 5);
    assert_eq!(config.storage.sqlite_path, Path::new("/var/lib/lineup/db.sqlite"));
    assert_eq!(config.maintenance_interval(), Duration::from_secs(30));
    assert_eq!(config.maintenance_settings().low_water_ms, 6 * HOUR_MS);
    assert_eq!(config.maintenance.max_concurrency, 4);
    assert_eq!(config.logging.format, "json");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_from_env_invalid_format_fails_validation() {
    clear_env();
    std::env::set_var("LINEUP_LOG_FORMAT", "xml");
    let config = Config::from_env().unwrap();
    clear_env();
    assert!(config.validate().is_err());
}
