//! Value serializers
//!
//! A serializer turns any serde value into the bytes stored in a data file.
//! It never sees the type tag; that is the registry's job.

use crate::error::{CodecError, CodecResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use settingsio_common::SerializerFormat;

/// Encodes values to bytes and back
pub trait Serializer: Send + Sync + 'static {
    /// Short format name for logging
    fn format_name(&self) -> &'static str;

    /// Encode `value`
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>>;

    /// Decode a `T` from `bytes`
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T>;
}

/// JSON encoding (serde_json)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact JSON
    pub const fn new() -> Self {
        Self { pretty: false }
    }

    /// Indented JSON, easier to inspect by hand
    pub const fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn format_name(&self) -> &'static str {
        "json"
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        let result = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        result.map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}

/// Compact binary encoding (bincode)
///
/// Bincode is not self-describing, so types that need `deserialize_any`
/// (such as `serde_json::Value`) cannot be decoded with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer;

impl Serializer for BincodeSerializer {
    fn format_name(&self) -> &'static str {
        "bincode"
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        bincode::serialize(value).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}

/// Serializer picked at runtime from configuration
#[derive(Debug, Clone, Copy)]
pub enum AnySerializer {
    Json(JsonSerializer),
    Bincode(BincodeSerializer),
}

impl AnySerializer {
    /// Build the serializer for a configured format
    pub const fn from_format(format: SerializerFormat) -> Self {
        match format {
            SerializerFormat::Json => Self::Json(JsonSerializer::pretty()),
            SerializerFormat::Bincode => Self::Bincode(BincodeSerializer),
        }
    }
}

impl Serializer for AnySerializer {
    fn format_name(&self) -> &'static str {
        match self {
            Self::Json(s) => s.format_name(),
            Self::Bincode(s) => s.format_name(),
        }
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        match self {
            Self::Json(s) => s.serialize(value),
            Self::Bincode(s) => s.serialize(value),
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        match self {
            Self::Json(s) => s.deserialize(bytes),
            Self::Bincode(s) => s.deserialize(bytes),
        }
    }
}
