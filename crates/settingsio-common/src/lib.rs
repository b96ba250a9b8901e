//! SettingsIO Common - Shared types and utilities
//!
//! This crate provides the naming rules, configuration structures and
//! error definitions shared by all SettingsIO components.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    Config, LoggingConfig, MAX_EVENT_CAPACITY, SerializerFormat, SettingsConfig, StorageConfig,
};
pub use error::{Error, Result};
pub use types::*;
