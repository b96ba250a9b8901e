//! Error types for SettingsIO
//!
//! Errors shared across crates: configuration loading and key validation.

use crate::types::KeyError;
use thiserror::Error;

/// Common result type for SettingsIO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for SettingsIO
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid setting key: {0}")]
    InvalidKey(#[from] KeyError),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_error_conversion() {
        let err: Error = KeyError::Empty.into();
        assert!(matches!(err, Error::InvalidKey(KeyError::Empty)));
        assert_eq!(err.to_string(), "invalid setting key: setting key cannot be empty");
    }
}
