//! Type tag registry
//!
//! The type file next to each persisted value holds a tag naming the value's
//! type. The registry resolves that tag to a pair of monomorphised encode /
//! decode functions, and maps each Rust type to the tag it is written under.
//!
//! The canonical tag of a type defaults to `std::any::type_name::<T>()`.
//! Applications reading stores written by another program can bind their
//! own tags with [`TypeRegistry::register_as`] or [`TypeRegistry::alias`].

use crate::error::{CodecError, CodecResult};
use crate::serializer::Serializer;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Type-erased setting value
pub type SettingValue = Arc<dyn Any + Send + Sync>;

/// Types that can be stored as settings
pub trait SettingType: Any + Clone + Send + Sync + Serialize + DeserializeOwned {}

impl<T> SettingType for T where T: Any + Clone + Send + Sync + Serialize + DeserializeOwned {}

type EncodeFn<S> = fn(&S, &(dyn Any + Send + Sync)) -> CodecResult<Vec<u8>>;
type DecodeFn<S> = fn(&S, &[u8]) -> CodecResult<SettingValue>;

struct TypeCodec<S> {
    type_id: TypeId,
    rust_name: &'static str,
    encode: EncodeFn<S>,
    decode: DecodeFn<S>,
}

impl<S> Clone for TypeCodec<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for TypeCodec<S> {}

impl<S: Serializer> TypeCodec<S> {
    fn of<T: SettingType>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            rust_name: type_name::<T>(),
            encode: encode_as::<S, T>,
            decode: decode_as::<S, T>,
        }
    }
}

fn encode_as<S: Serializer, T: SettingType>(
    serializer: &S,
    value: &(dyn Any + Send + Sync),
) -> CodecResult<Vec<u8>> {
    let value = value
        .downcast_ref::<T>()
        .ok_or(CodecError::ValueTypeMismatch {
            expected: type_name::<T>(),
        })?;
    serializer.serialize(value)
}

fn decode_as<S: Serializer, T: SettingType>(
    serializer: &S,
    bytes: &[u8],
) -> CodecResult<SettingValue> {
    let value: T = serializer.deserialize(bytes)?;
    Ok(Arc::new(value))
}

struct RegistryState<S> {
    /// Codec per stored tag (canonical tags and aliases)
    by_tag: HashMap<String, TypeCodec<S>>,
    /// Canonical tag per Rust type
    tags: HashMap<TypeId, Arc<str>>,
}

/// Registry mapping stored type tags to typed codecs
pub struct TypeRegistry<S> {
    state: RwLock<RegistryState<S>>,
}

impl<S: Serializer> Default for TypeRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Serializer> TypeRegistry<S> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                by_tag: HashMap::new(),
                tags: HashMap::new(),
            }),
        }
    }

    /// Create a registry with the common scalar and string types registered
    pub fn with_builtin_types() -> Self {
        let registry = Self::new();
        {
            let mut state = registry.state.write();
            Self::seed::<bool>(&mut state);
            Self::seed::<char>(&mut state);
            Self::seed::<i8>(&mut state);
            Self::seed::<i16>(&mut state);
            Self::seed::<i32>(&mut state);
            Self::seed::<i64>(&mut state);
            Self::seed::<u8>(&mut state);
            Self::seed::<u16>(&mut state);
            Self::seed::<u32>(&mut state);
            Self::seed::<u64>(&mut state);
            Self::seed::<f32>(&mut state);
            Self::seed::<f64>(&mut state);
            Self::seed::<String>(&mut state);
            Self::seed::<Vec<String>>(&mut state);
            Self::seed::<Vec<u8>>(&mut state);
            Self::seed::<serde_json::Value>(&mut state);
        }
        registry
    }

    /// Insert `T` under its default tag; builtin tags are all distinct
    fn seed<T: SettingType>(state: &mut RegistryState<S>) {
        let tag: Arc<str> = Arc::from(type_name::<T>());
        state.by_tag.insert(tag.to_string(), TypeCodec::of::<T>());
        state.tags.insert(TypeId::of::<T>(), tag);
    }

    /// Register `T` under its default tag, returning its canonical tag
    ///
    /// A type that is already registered keeps its current tag. Fails if the
    /// default tag is already bound to another type.
    pub fn register<T: SettingType>(&self) -> CodecResult<Arc<str>> {
        if let Some(tag) = self.tag_of::<T>() {
            return Ok(tag);
        }

        let mut state = self.state.write();
        if let Some(tag) = state.tags.get(&TypeId::of::<T>()) {
            return Ok(Arc::clone(tag));
        }
        let tag: Arc<str> = Arc::from(type_name::<T>());
        Self::bind(&mut state, &tag, TypeCodec::of::<T>())?;
        state.tags.insert(TypeId::of::<T>(), Arc::clone(&tag));
        debug!("Registered setting type {}", tag);
        Ok(tag)
    }

    /// Register `T` and make `tag` the tag it is written under
    pub fn register_as<T: SettingType>(&self, tag: impl Into<String>) -> CodecResult<Arc<str>> {
        let tag = tag.into();
        let mut state = self.state.write();
        Self::bind(&mut state, &tag, TypeCodec::of::<T>())?;
        let tag: Arc<str> = Arc::from(tag);
        state.tags.insert(TypeId::of::<T>(), Arc::clone(&tag));
        debug!("Registered setting type {} as {}", type_name::<T>(), tag);
        Ok(tag)
    }

    /// Accept `tag` when decoding `T` without changing how `T` is written
    pub fn alias<T: SettingType>(&self, tag: impl Into<String>) -> CodecResult<()> {
        let tag = tag.into();
        let mut state = self.state.write();
        if !state.tags.contains_key(&TypeId::of::<T>()) {
            let canonical: Arc<str> = Arc::from(type_name::<T>());
            Self::bind(&mut state, &canonical, TypeCodec::of::<T>())?;
            state.tags.insert(TypeId::of::<T>(), canonical);
        }
        Self::bind(&mut state, &tag, TypeCodec::of::<T>())
    }

    fn bind(state: &mut RegistryState<S>, tag: &str, codec: TypeCodec<S>) -> CodecResult<()> {
        if let Some(existing) = state.by_tag.get(tag)
            && existing.type_id != codec.type_id
        {
            return Err(CodecError::TagConflict {
                tag: tag.to_string(),
                existing: existing.rust_name,
            });
        }
        state.by_tag.insert(tag.to_string(), codec);
        Ok(())
    }

    /// Canonical tag of `T`, if registered
    pub fn tag_of<T: 'static>(&self) -> Option<Arc<str>> {
        self.state.read().tags.get(&TypeId::of::<T>()).cloned()
    }

    /// Whether `tag` resolves to a codec
    pub fn contains(&self, tag: &str) -> bool {
        self.state.read().by_tag.contains_key(tag)
    }

    /// Every tag that resolves to a codec, sorted
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.state.read().by_tag.keys().cloned().collect();
        tags.sort();
        tags
    }

    fn codec(&self, tag: &str) -> CodecResult<TypeCodec<S>> {
        self.state
            .read()
            .by_tag
            .get(tag)
            .copied()
            .ok_or_else(|| CodecError::UnknownType(tag.to_string()))
    }

    /// Encode `value` with the codec registered for `tag`
    pub fn encode(
        &self,
        serializer: &S,
        tag: &str,
        value: &(dyn Any + Send + Sync),
    ) -> CodecResult<Vec<u8>> {
        let codec = self.codec(tag)?;
        (codec.encode)(serializer, value)
    }

    /// Decode `bytes` with the codec registered for `tag`
    pub fn decode(&self, serializer: &S, tag: &str, bytes: &[u8]) -> CodecResult<SettingValue> {
        let codec = self.codec(tag)?;
        (codec.decode)(serializer, bytes)
    }
}
