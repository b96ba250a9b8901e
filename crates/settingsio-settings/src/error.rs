//! Settings error types

use settingsio_codec::CodecError;
use settingsio_common::KeyError;
use settingsio_folder::FolderError;
use thiserror::Error;

/// Settings error
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Storage folder failure
    #[error("storage error: {0}")]
    Folder(#[from] FolderError),

    /// Encoding, decoding or type resolution failure
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Key rejected by the naming rules
    #[error("invalid setting key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Value read back as a different type than it was stored with
    #[error("setting {key} holds {actual}, requested {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: String,
    },

    /// Data file has no sibling type file
    #[error("type file missing for setting {0}")]
    MissingTypeFile(String),

    /// Type file is not UTF-8
    #[error("type file of setting {key} is not valid UTF-8: {source}")]
    InvalidTypeName {
        key: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Type file is empty or whitespace
    #[error("type file of setting {0} is blank")]
    BlankTypeName(String),

    /// Storage gate closed; no more saves or loads
    #[error("settings storage is closed")]
    GateClosed,
}

/// Result type for settings operations
pub type SettingsResult<T> = Result<T, SettingsError>;
