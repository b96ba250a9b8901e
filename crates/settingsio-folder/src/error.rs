//! Storage folder error types

use thiserror::Error;

/// Storage folder error
#[derive(Error, Debug)]
pub enum FolderError {
    /// I/O error from the underlying backend
    #[error("I/O error on {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// File name is not usable in this folder
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(String),
}

impl FolderError {
    /// Wrap an I/O error with the name of the file it concerns
    pub fn io(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            name: name.into(),
            source,
        }
    }
}

/// Result type for folder operations
pub type FolderResult<T> = Result<T, FolderError>;
