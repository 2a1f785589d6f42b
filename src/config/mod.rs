//! Configuration management for lineup
//!
//! This module handles loading and validating configuration from environment variables,
//! TOML files, and command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::infinite::MaintenanceSettings;
use crate::models::{HOUR_MS, MINUTE_MS};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Scheduling engine configuration
    pub engine: EngineConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Buffer maintenance configuration
    pub maintenance: MaintenanceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Scheduling engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Channel-wide minimum time between two plays of the same filler
    pub filler_repeat_cooldown_ms: i64,

    /// Buffer length for infinite schedules that do not set one
    pub default_buffer_days: u32,

    /// Safety cap on items produced by one scheduler or generation run
    pub max_lineup_items: usize,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Buffer maintenance configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Seconds between two maintenance passes
    pub interval_secs: u64,

    /// Extend buffers reaching less than this many hours past now
    pub low_water_hours: u32,

    /// Delete items that ended more than this many hours ago
    pub retention_hours: u32,

    /// Schedules maintained concurrently
    pub max_concurrency: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json)
    pub format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            filler_repeat_cooldown_ms: 30 * MINUTE_MS,
            default_buffer_days: 2,
            max_lineup_items: crate::scheduler::DEFAULT_MAX_ITEMS,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/lineup.db"),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            low_water_hours: 24,
            retention_hours: 24,
            max_concurrency: 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("pretty"),
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or malformed
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let engine = EngineConfig {
            filler_repeat_cooldown_ms: env_or(
                "LINEUP_FILLER_REPEAT_COOLDOWN_MS",
                defaults.engine.filler_repeat_cooldown_ms,
            ),
            default_buffer_days: env_or("LINEUP_DEFAULT_BUFFER_DAYS", defaults.engine.default_buffer_days),
            max_lineup_items: env_or("LINEUP_MAX_LINEUP_ITEMS", defaults.engine.max_lineup_items),
        };

        let sqlite_path = std::env::var("LINEUP_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.sqlite_path);

        let maintenance = MaintenanceConfig {
            interval_secs: env_or("LINEUP_MAINTENANCE_INTERVAL_SECS", defaults.maintenance.interval_secs),
            low_water_hours: env_or("LINEUP_LOW_WATER_HOURS", defaults.maintenance.low_water_hours),
            retention_hours: env_or("LINEUP_RETENTION_HOURS", defaults.maintenance.retention_hours),
            max_concurrency: env_or("LINEUP_MAX_CONCURRENCY", defaults.maintenance.max_concurrency),
        };

        let log_level = std::env::var("LINEUP_LOG_LEVEL").unwrap_or(defaults.logging.level);
        let log_format = std::env::var("LINEUP_LOG_FORMAT").unwrap_or(defaults.logging.format);

        Ok(Self {
            engine,
            storage: StorageConfig { sqlite_path },
            maintenance,
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.engine.filler_repeat_cooldown_ms < 0 {
            anyhow::bail!("filler_repeat_cooldown_ms must not be negative");
        }

        if self.engine.default_buffer_days == 0 {
            anyhow::bail!("default_buffer_days must be greater than 0");
        }

        if self.engine.max_lineup_items == 0 {
            anyhow::bail!("max_lineup_items must be greater than 0");
        }

        if self.maintenance.interval_secs == 0 {
            anyhow::bail!("interval_secs must be greater than 0");
        }

        if self.maintenance.low_water_hours == 0 {
            anyhow::bail!("low_water_hours must be greater than 0");
        }

        if self.maintenance.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            anyhow::bail!("log format must be 'pretty' or 'json', got '{}'", self.logging.format);
        }

        Ok(())
    }

    /// Get the maintenance interval as Duration
    #[must_use]
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance.interval_secs)
    }

    /// Maintenance settings derived from this configuration
    #[must_use]
    pub fn maintenance_settings(&self) -> MaintenanceSettings {
        MaintenanceSettings {
            low_water_ms: i64::from(self.maintenance.low_water_hours) * HOUR_MS,
            retention_ms: i64::from(self.maintenance.retention_hours) * HOUR_MS,
            max_concurrency: self.maintenance.max_concurrency,
            interval: self.maintenance_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.maintenance.max_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.filler_repeat_cooldown_ms = -1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.format = String::from("xml");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            default_buffer_days = 3

            [maintenance]
            interval_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.default_buffer_days, 3);
        assert_eq!(config.engine.filler_repeat_cooldown_ms, 30 * MINUTE_MS);
        assert_eq!(config.maintenance.interval_secs, 60);
        assert_eq!(config.maintenance.retention_hours, 24);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_maintenance_settings_conversion() {
        let config = Config::default();
        let settings = config.maintenance_settings();
        assert_eq!(settings.low_water_ms, 24 * HOUR_MS);
        assert_eq!(settings.interval, Duration::from_secs(300));
        assert_eq!(settings.max_concurrency, 4);
    }
}
