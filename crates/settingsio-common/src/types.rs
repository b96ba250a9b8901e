//! Core type definitions for SettingsIO
//!
//! Setting keys double as file names in the storage folder, so they are
//! validated once here and every other crate can rely on the rules.

use derive_more::Display;
use std::fmt;
use std::str::FromStr;

/// Suffix of the sibling file that carries a setting's type tag.
///
/// For a key `K` the serialized value lives in `K` and the UTF-8 type tag in
/// `K.Type`. The literal is part of the on-disk format.
pub const TYPE_SUFFIX: &str = ".Type";

/// Synthetic change-notification name for the aggregate dirty flag
pub const HAS_UNSAVED_CHANGES: &str = "HasUnsavedChanges";

/// Maximum key length in bytes (leaves room for the type suffix in a
/// 255-byte file name)
pub const MAX_KEY_LEN: usize = 255 - TYPE_SUFFIX.len();

/// Name of the type file for a setting key
#[must_use]
pub fn type_file_name(key: &str) -> String {
    format!("{key}{TYPE_SUFFIX}")
}

/// True if `name` is a type file rather than a data file
#[must_use]
pub fn is_type_file_name(name: &str) -> bool {
    name.ends_with(TYPE_SUFFIX)
}

/// Validated setting key
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{_0}")]
pub struct SettingKey(String);

impl SettingKey {
    /// Create a new setting key (validates naming rules)
    pub fn new(key: impl Into<String>) -> Result<Self, KeyError> {
        let key = key.into();
        Self::validate(&key)?;
        Ok(Self(key))
    }

    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate a key without allocating a `SettingKey`
    pub fn validate(key: &str) -> Result<(), KeyError> {
        if key.is_empty() {
            return Err(KeyError::Empty);
        }
        if key.len() > MAX_KEY_LEN {
            return Err(KeyError::TooLong);
        }
        if key == "." || key == ".." {
            return Err(KeyError::Reserved);
        }
        if is_type_file_name(key) {
            return Err(KeyError::TypeSuffix);
        }
        if let Some(c) = key.chars().find(|c| matches!(c, '/' | '\\' | '\0')) {
            return Err(KeyError::InvalidChar(c));
        }
        Ok(())
    }
}

impl FromStr for SettingKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SettingKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SettingKey({:?})", self.0)
    }
}

/// Errors that can occur when creating a setting key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("setting key cannot be empty")]
    Empty,
    #[error("setting key cannot exceed 250 bytes")]
    TooLong,
    #[error("setting key cannot be '.' or '..'")]
    Reserved,
    #[error("setting key cannot end with the reserved suffix .Type")]
    TypeSuffix,
    #[error("setting key contains invalid character: {0:?}")]
    InvalidChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_key_valid() {
        assert!(SettingKey::new("theme").is_ok());
        assert!(SettingKey::new("editor.fontSize").is_ok());
        assert!(SettingKey::new("Type").is_ok());
        assert!(SettingKey::new("my.Types").is_ok());
    }

    #[test]
    fn test_setting_key_invalid() {
        assert_eq!(SettingKey::new(""), Err(KeyError::Empty));
        assert_eq!(SettingKey::new("width.Type"), Err(KeyError::TypeSuffix));
        assert_eq!(SettingKey::new(".."), Err(KeyError::Reserved));
        assert_eq!(SettingKey::new("a/b"), Err(KeyError::InvalidChar('/')));
        assert_eq!(SettingKey::new("a\\b"), Err(KeyError::InvalidChar('\\')));
        assert_eq!(SettingKey::new("x".repeat(MAX_KEY_LEN + 1)), Err(KeyError::TooLong));
    }

    #[test]
    fn test_setting_key_parse_and_display() {
        let key: SettingKey = "volume".parse().unwrap();
        assert_eq!(key.as_str(), "volume");
        assert_eq!(key.to_string(), "volume");
        assert_eq!("a/b".parse::<SettingKey>(), Err(KeyError::InvalidChar('/')));
    }

    #[test]
    fn test_type_file_name() {
        assert_eq!(type_file_name("volume"), "volume.Type");
        assert!(is_type_file_name("volume.Type"));
        assert!(!is_type_file_name("volume"));
    }
}
