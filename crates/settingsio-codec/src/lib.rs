//! SettingsIO Codec - Value serialization
//!
//! Persisted settings are untyped bytes plus a type tag. This crate provides
//! the two halves needed to turn them back into typed values:
//!
//! - [`Serializer`]: encodes any serde value to bytes and back
//!   ([`JsonSerializer`], [`BincodeSerializer`])
//! - [`TypeRegistry`]: maps a stored type tag to the concrete Rust type,
//!   populated by the application before loading

pub mod error;
pub mod registry;
pub mod serializer;

pub use error::{CodecError, CodecResult};
pub use registry::{SettingType, SettingValue, TypeRegistry};
pub use serializer::{AnySerializer, BincodeSerializer, JsonSerializer, Serializer};
