//! Configuration types for SettingsIO
//!
//! This module defines the configuration structures used by the settings
//! engine and the CLI. Every section defaults so partial TOML files load.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration for SettingsIO
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage folder configuration
    pub storage: StorageConfig,
    /// Engine behaviour
    pub settings: SettingsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.settings.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Load configuration from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Storage folder configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted settings
    pub dir: PathBuf,
    /// On-disk value encoding
    pub format: SerializerFormat,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./settings"),
            format: SerializerFormat::Json,
        }
    }
}

/// Value encoding used for data files
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializerFormat {
    /// Human-readable JSON (serde_json)
    #[default]
    Json,
    /// Compact binary (bincode)
    Bincode,
}

impl std::str::FromStr for SerializerFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "bincode" => Ok(Self::Bincode),
            other => Err(Error::configuration(format!(
                "unknown serializer format: {other}"
            ))),
        }
    }
}

/// Upper bound for [`SettingsConfig::event_capacity`]
pub const MAX_EVENT_CAPACITY: usize = 1 << 16;

/// Settings engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Save only entries whose value changed since the last successful save
    pub flush_only_changed_values: bool,
    /// Mark defaults produced by `get_setting` as dirty so they get persisted
    pub flush_default_values: bool,
    /// Delete the files of keys removed through the facade on the next save
    pub prune_removed_keys: bool,
    /// Buffered events per subscriber before slow receivers start lagging
    pub event_capacity: usize,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            flush_only_changed_values: true,
            flush_default_values: false,
            prune_removed_keys: false,
            event_capacity: 256,
        }
    }
}

impl SettingsConfig {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 || self.event_capacity > MAX_EVENT_CAPACITY {
            return Err(Error::configuration(format!(
                "settings.event_capacity must be between 1 and {MAX_EVENT_CAPACITY}, got {}",
                self.event_capacity
            )));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
