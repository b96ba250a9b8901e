//! Codec error types

use thiserror::Error;

/// Errors raised while encoding or decoding setting values
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("deserialization failed: {0}")]
    Deserialize(String),

    #[error("no codec registered for type tag {0:?}")]
    UnknownType(String),

    #[error("value does not have the registered type {expected}")]
    ValueTypeMismatch { expected: &'static str },

    #[error("type tag {tag:?} is already bound to {existing}")]
    TagConflict { tag: String, existing: &'static str },
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;
