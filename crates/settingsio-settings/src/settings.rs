//! Settings facade
//!
//! Typed get/set over the runtime store. Everything here except `save`,
//! `load` and `close` is synchronous and touches memory only.

use crate::engine::{ReconcileReport, Reconciler};
use crate::entry::SettingEntry;
use crate::error::{SettingsError, SettingsResult};
use crate::events::{EventBus, SettingsEvent};
use crate::store::RuntimeStore;
use settingsio_codec::{JsonSerializer, SettingType, Serializer, TypeRegistry};
use settingsio_common::{SettingKey, SettingsConfig};
use settingsio_folder::StorageFolder;
use std::any::type_name;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// In-memory settings with per-key persistence to a [`StorageFolder`]
pub struct Settings<S: Serializer = JsonSerializer> {
    store: RuntimeStore,
    registry: TypeRegistry<S>,
    serializer: S,
    folder: Arc<dyn StorageFolder>,
    events: EventBus,
    config: SettingsConfig,
    /// Single permit serializing save and load passes
    gate: Semaphore,
}

impl<S: Serializer> Settings<S> {
    /// Create settings over `folder` with default configuration
    pub fn new(folder: Arc<dyn StorageFolder>, serializer: S) -> Self {
        Self::with_config(folder, serializer, SettingsConfig::default())
    }

    /// Create settings over `folder`
    ///
    /// The registry starts with the builtin scalar and string types.
    pub fn with_config(folder: Arc<dyn StorageFolder>, serializer: S, config: SettingsConfig) -> Self {
        debug!(
            "Settings over {} folder ({} encoding)",
            folder.backend_name(),
            serializer.format_name()
        );
        Self {
            store: RuntimeStore::new(),
            registry: TypeRegistry::with_builtin_types(),
            serializer,
            folder,
            events: EventBus::new(config.event_capacity),
            config,
            gate: Semaphore::new(1),
        }
    }

    /// Engine configuration
    pub const fn config(&self) -> &SettingsConfig {
        &self.config
    }

    /// Type registry consulted by `load`
    pub const fn registry(&self) -> &TypeRegistry<S> {
        &self.registry
    }

    /// Make `T` loadable under its default tag
    pub fn register<T: SettingType>(&self) -> SettingsResult<Arc<str>> {
        Ok(self.registry.register::<T>()?)
    }

    /// Make `T` loadable and persisted under `tag`
    pub fn register_as<T: SettingType>(&self, tag: impl Into<String>) -> SettingsResult<Arc<str>> {
        Ok(self.registry.register_as::<T>(tag)?)
    }

    /// Subscribe to change and failure events
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.events.subscribe()
    }

    // =========== Typed access ===========

    /// Read `key` as `T`
    ///
    /// An absent key takes the value produced by `default`; a `Some` default
    /// is cached (dirty only when `flush_default_values` is set). Reading a
    /// key stored with another type is a [`SettingsError::TypeMismatch`].
    pub fn get_setting<T, F>(&self, key: &str, default: F) -> SettingsResult<Option<T>>
    where
        T: SettingType,
        F: FnOnce() -> Option<T>,
    {
        if let Some(entry) = self.store.get(key) {
            return Self::cast(key, &entry).map(Some);
        }

        SettingKey::validate(key)?;
        match default() {
            Some(value) => self.cache_default(key, value).map(Some),
            None => Ok(None),
        }
    }

    /// Read `key` as `T`, caching `default()` when absent
    pub fn get_or<T, F>(&self, key: &str, default: F) -> SettingsResult<T>
    where
        T: SettingType,
        F: FnOnce() -> T,
    {
        if let Some(entry) = self.store.get(key) {
            return Self::cast(key, &entry);
        }
        SettingKey::validate(key)?;
        self.cache_default(key, default())
    }

    fn cache_default<T: SettingType>(&self, key: &str, value: T) -> SettingsResult<T> {
        let tag = self.registry.register::<T>()?;
        // A concurrent writer may have won; return whatever is stored
        let (entry, flip) = self.store.insert_if_absent(
            key,
            tag,
            Arc::new(value),
            self.config.flush_default_values,
        );
        self.events.dirty_flag(flip);
        Self::cast(key, &entry)
    }

    fn cast<T: SettingType>(key: &str, entry: &SettingEntry) -> SettingsResult<T> {
        entry
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| SettingsError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
                actual: entry.type_name.to_string(),
            })
    }

    /// Write `key`; `None` removes it
    pub fn set_setting<T: SettingType>(&self, key: &str, value: Option<T>) -> SettingsResult<()> {
        SettingKey::validate(key)?;

        let flip = match value {
            Some(value) => {
                let tag = self.registry.register::<T>()?;
                self.store.set(key, tag, Arc::new(value), true)
            }
            None => self.store.remove(key),
        };
        self.events.changed(key);
        self.events.dirty_flag(flip);
        Ok(())
    }

    /// Drop `key` so the next read falls back to its default
    pub fn reset_setting(&self, key: &str) {
        let flip = self.store.remove(key);
        self.events.changed(key);
        self.events.dirty_flag(flip);
    }

    /// Drop every key
    pub fn reset_all_settings(&self) {
        for key in self.store.keys() {
            self.reset_setting(&key);
        }
    }

    // =========== Queries ===========

    /// True iff any setting changed since it was last saved
    pub fn has_unsaved_changes(&self) -> bool {
        self.store.has_dirty()
    }

    /// Whether `key` is cached
    pub fn contains_key(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    /// Sorted cached keys
    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    /// Sorted keys with unsaved changes
    pub fn dirty_keys(&self) -> Vec<String> {
        self.store.dirty_keys()
    }

    /// Type tag `key` is stored under
    pub fn type_of(&self, key: &str) -> Option<Arc<str>> {
        self.store.get(key).map(|e| e.type_name)
    }

    /// Number of cached settings
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no settings are cached
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // =========== Persistence ===========

    /// Persist settings to the folder
    ///
    /// Per-key failures are reported as [`SettingsEvent::SaveFailed`]; the
    /// call itself only fails once the gate is closed.
    pub async fn save(&self) -> SettingsResult<ReconcileReport> {
        self.save_cancellable(&CancellationToken::new()).await
    }

    /// Persist settings, stopping early when `cancel` fires
    pub async fn save_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> SettingsResult<ReconcileReport> {
        let Some(_permit) = self.acquire_gate(cancel).await? else {
            return Ok(ReconcileReport::cancelled());
        };
        Ok(self.reconciler().save(cancel).await)
    }

    /// Reload settings from the folder
    ///
    /// Per-key failures are reported as [`SettingsEvent::LoadFailed`] and
    /// leave the in-memory value untouched.
    pub async fn load(&self) -> SettingsResult<ReconcileReport> {
        self.load_cancellable(&CancellationToken::new()).await
    }

    /// Reload settings, stopping early when `cancel` fires
    pub async fn load_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> SettingsResult<ReconcileReport> {
        let Some(_permit) = self.acquire_gate(cancel).await? else {
            return Ok(ReconcileReport::cancelled());
        };
        self.reconciler().load(cancel).await
    }

    /// Wait for the running pass, then refuse further saves and loads
    pub async fn close(&self) {
        if let Ok(permit) = self.gate.acquire().await {
            self.gate.close();
            drop(permit);
            info!("Settings storage closed");
        }
    }

    async fn acquire_gate(
        &self,
        cancel: &CancellationToken,
    ) -> SettingsResult<Option<SemaphorePermit<'_>>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(None),
            permit = self.gate.acquire() => permit.map(Some).map_err(|_| SettingsError::GateClosed),
        }
    }

    fn reconciler(&self) -> Reconciler<'_, S> {
        Reconciler {
            store: &self.store,
            registry: &self.registry,
            serializer: &self.serializer,
            folder: self.folder.as_ref(),
            events: &self.events,
            config: &self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settingsio_common::{HAS_UNSAVED_CHANGES, KeyError};
    use settingsio_folder::MemoryFolder;

    fn test_settings(config: SettingsConfig) -> (MemoryFolder, Settings) {
        let folder = MemoryFolder::new();
        let settings = Settings::with_config(Arc::new(folder.clone()), JsonSerializer::new(), config);
        (folder, settings)
    }

    fn drain(rx: &mut broadcast::Receiver<SettingsEvent>) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name().to_string());
        }
        names
    }

    #[test]
    fn test_default_is_cached() {
        let (_, settings) = test_settings(SettingsConfig::default());

        assert_eq!(settings.get_or("volume", || 7_i32).unwrap(), 7);
        assert_eq!(settings.get_or("volume", || 99_i32).unwrap(), 7);
        assert!(settings.contains_key("volume"));
        assert!(!settings.has_unsaved_changes());
    }

    #[test]
    fn test_none_default_is_not_cached() {
        let (_, settings) = test_settings(SettingsConfig::default());

        let value: Option<String> = settings.get_setting("nickname", || None).unwrap();
        assert!(value.is_none());
        assert!(!settings.contains_key("nickname"));
    }

    #[test]
    fn test_flush_default_values_marks_dirty() {
        let config = SettingsConfig {
            flush_default_values: true,
            ..SettingsConfig::default()
        };
        let (_, settings) = test_settings(config);
        let mut rx = settings.subscribe();

        settings.get_or("theme", || "dark".to_string()).unwrap();
        assert!(settings.has_unsaved_changes());
        assert_eq!(drain(&mut rx), vec![HAS_UNSAVED_CHANGES.to_string()]);
    }

    #[test]
    fn test_set_then_get() {
        let (_, settings) = test_settings(SettingsConfig::default());

        settings.set_setting("theme", Some("light".to_string())).unwrap();
        assert_eq!(
            settings.get_or("theme", || "anything".to_string()).unwrap(),
            "light"
        );
        assert_eq!(settings.type_of("theme").as_deref(), Some(type_name::<String>()));
        assert!(settings.has_unsaved_changes());
        assert_eq!(settings.dirty_keys(), vec!["theme".to_string()]);
    }

    #[test]
    fn test_set_none_falls_back_to_default() {
        let (_, settings) = test_settings(SettingsConfig::default());

        settings.set_setting("width", Some(1024_u32)).unwrap();
        settings.set_setting::<u32>("width", None).unwrap();
        assert!(!settings.contains_key("width"));
        assert_eq!(settings.get_or("width", || 640_u32).unwrap(), 640);
    }

    #[test]
    fn test_type_mismatch_propagates() {
        let (_, settings) = test_settings(SettingsConfig::default());

        settings.set_setting("width", Some(1024_u32)).unwrap();
        let result = settings.get_or("width", || 0_i64);
        assert!(matches!(
            result,
            Err(SettingsError::TypeMismatch { ref key, expected: "i64", .. }) if key == "width"
        ));
    }

    #[test]
    fn test_invalid_key_rejected() {
        let (_, settings) = test_settings(SettingsConfig::default());

        let result = settings.set_setting("layout.Type", Some(1_i32));
        assert!(matches!(result, Err(SettingsError::InvalidKey(KeyError::TypeSuffix))));
        let result = settings.get_or("", || 1_i32);
        assert!(matches!(result, Err(SettingsError::InvalidKey(KeyError::Empty))));
        assert!(settings.is_empty());
    }

    #[test]
    fn test_set_notifications() {
        let (_, settings) = test_settings(SettingsConfig::default());
        let mut rx = settings.subscribe();

        settings.set_setting("a", Some(1_i32)).unwrap();
        assert_eq!(
            drain(&mut rx),
            vec!["a".to_string(), HAS_UNSAVED_CHANGES.to_string()]
        );

        // Already dirty: no aggregate notification
        settings.set_setting("b", Some(2_i32)).unwrap();
        assert_eq!(drain(&mut rx), vec!["b".to_string()]);
    }

    #[test]
    fn test_reset_notifications() {
        let (_, settings) = test_settings(SettingsConfig::default());
        settings.set_setting("a", Some(1_i32)).unwrap();
        let mut rx = settings.subscribe();

        settings.reset_setting("a");
        assert_eq!(
            drain(&mut rx),
            vec!["a".to_string(), HAS_UNSAVED_CHANGES.to_string()]
        );
        assert!(!settings.has_unsaved_changes());

        // Unknown key still notifies, flag unchanged
        settings.reset_setting("never-set");
        assert_eq!(drain(&mut rx), vec!["never-set".to_string()]);
    }

    #[test]
    fn test_reset_all_settings() {
        let (_, settings) = test_settings(SettingsConfig::default());
        settings.set_setting("a", Some(1_i32)).unwrap();
        settings.set_setting("b", Some(true)).unwrap();
        settings.get_or("c", || "default".to_string()).unwrap();

        settings.reset_all_settings();
        assert!(settings.is_empty());
        assert!(!settings.has_unsaved_changes());
        assert_eq!(settings.get_or("a", || 10_i32).unwrap(), 10);
        assert!(!settings.get_or("b", || false).unwrap());
        assert_eq!(settings.get_or("c", || "other".to_string()).unwrap(), "other");
    }

    #[test]
    fn test_typed_access_registers_type() {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Window {
            width: u32,
            height: u32,
        }

        let (_, settings) = test_settings(SettingsConfig::default());
        let tag = type_name::<Window>();
        assert!(!settings.registry().contains(tag));

        settings
            .set_setting("window", Some(Window { width: 1, height: 2 }))
            .unwrap();
        assert!(settings.registry().contains(tag));
    }

    #[tokio::test]
    async fn test_register_as_controls_persisted_tag() {
        let (folder, settings) = test_settings(SettingsConfig::default());
        settings.register_as::<i32>("System.Int32").unwrap();

        settings.set_setting("count", Some(3_i32)).unwrap();
        settings.save().await.unwrap();
        assert_eq!(folder.read_file("count.Type").unwrap(), "System.Int32");
    }

    #[tokio::test]
    async fn test_closed_gate() {
        let (_, settings) = test_settings(SettingsConfig::default());
        settings.close().await;

        assert!(matches!(settings.save().await, Err(SettingsError::GateClosed)));
        assert!(matches!(settings.load().await, Err(SettingsError::GateClosed)));

        // Memory access keeps working
        settings.set_setting("after-close", Some(1_i32)).unwrap();
        assert!(settings.contains_key("after-close"));
    }
}
