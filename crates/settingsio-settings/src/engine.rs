//! Load/save reconciliation
//!
//! Save walks a snapshot of the runtime store and writes each key's data
//! and type files. Load walks the folder listing, drops in-memory keys whose
//! files are gone and decodes every data file that has a type file.
//!
//! Both passes treat keys independently: a failing key is reported through
//! [`EventBus`] and the pass moves on. Cancellation ends the pass early
//! without an error; keys already finished stay committed.

use crate::entry::SettingEntry;
use crate::error::{SettingsError, SettingsResult};
use crate::events::EventBus;
use crate::store::RuntimeStore;
use bytes::Bytes;
use settingsio_codec::{CodecError, Serializer, TypeRegistry};
use settingsio_common::{SettingsConfig, is_type_file_name, type_file_name};
use settingsio_folder::{StorageFile, StorageFolder};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome counts of one save or load pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys the pass tried to persist or restore
    pub attempted: usize,
    /// Keys persisted or restored
    pub succeeded: usize,
    /// Clean keys skipped by a save
    pub skipped: usize,
    /// Keys that raised a failure event
    pub failed: usize,
    /// Ghost keys dropped by a load, or keys pruned by a save
    pub removed: usize,
    /// Pass stopped early on cancellation
    pub cancelled: bool,
}

impl ReconcileReport {
    pub(crate) fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }
}

enum Step {
    Done,
    Cancelled,
}

/// Borrowed view of everything one pass needs
pub(crate) struct Reconciler<'a, S> {
    pub store: &'a RuntimeStore,
    pub registry: &'a TypeRegistry<S>,
    pub serializer: &'a S,
    pub folder: &'a dyn StorageFolder,
    pub events: &'a EventBus,
    pub config: &'a SettingsConfig,
}

impl<S: Serializer> Reconciler<'_, S> {
    /// Persist the runtime store
    pub async fn save(&self, cancel: &CancellationToken) -> ReconcileReport {
        let snapshot = self.store.snapshot();
        let mut report = ReconcileReport::default();

        for (key, entry) in &snapshot {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if self.config.flush_only_changed_values && !entry.is_dirty {
                report.skipped += 1;
                continue;
            }

            report.attempted += 1;
            match self.save_entry(key, entry, cancel).await {
                Ok(Step::Done) => {
                    report.succeeded += 1;
                    self.events
                        .dirty_flag(self.store.mark_clean(key, entry.version));
                    debug!("Saved setting {key} ({})", entry.type_name);
                }
                Ok(Step::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Failed to save setting {key}: {e}");
                    self.events.save_failed(key.as_str(), e);
                }
            }
        }

        if !report.cancelled && self.config.prune_removed_keys {
            self.prune_removed(&mut report).await;
        }

        if report.cancelled {
            info!(
                "Save cancelled after {}/{} settings",
                report.succeeded, report.attempted
            );
        } else if report.attempted > 0 || report.removed > 0 {
            info!(
                "Saved {}/{} settings to {} folder ({} unchanged, {} pruned)",
                report.succeeded,
                report.attempted,
                self.folder.backend_name(),
                report.skipped,
                report.removed
            );
        }
        report
    }

    async fn save_entry(
        &self,
        key: &str,
        entry: &SettingEntry,
        cancel: &CancellationToken,
    ) -> SettingsResult<Step> {
        // Encode first so a value that cannot be serialized never creates files
        let bytes = self
            .registry
            .encode(self.serializer, &entry.type_name, &*entry.data)?;
        if cancel.is_cancelled() {
            return Ok(Step::Cancelled);
        }

        let data_file = self.folder.create_or_open_file(key).await?;
        let type_file = self.folder.create_or_open_file(&type_file_name(key)).await?;
        if cancel.is_cancelled() {
            return Ok(Step::Cancelled);
        }

        // The data and type writes are not split by a cancellation check so
        // a finished data write always gets its matching type file.
        data_file.write_all(Bytes::from(bytes)).await?;
        type_file
            .write_all(Bytes::copy_from_slice(entry.type_name.as_bytes()))
            .await?;
        Ok(Step::Done)
    }

    async fn prune_removed(&self, report: &mut ReconcileReport) {
        for key in self.store.take_removed() {
            if self.store.contains(&key) {
                continue;
            }
            let result = async {
                self.folder.delete_file(&key).await?;
                self.folder.delete_file(&type_file_name(&key)).await?;
                Ok::<(), SettingsError>(())
            }
            .await;

            match result {
                Ok(()) => {
                    report.removed += 1;
                    debug!("Pruned setting {key}");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Failed to prune setting {key}: {e}");
                    self.store.restore_removed(&key);
                    self.events.save_failed(key, e);
                }
            }
        }
    }

    /// Reload the runtime store from the folder
    pub async fn load(&self, cancel: &CancellationToken) -> SettingsResult<ReconcileReport> {
        let listing = self.folder.list_files().await?;
        let files: HashMap<String, Arc<dyn StorageFile>> = listing
            .into_iter()
            .map(|file| (file.name().to_string(), file))
            .collect();
        let mut report = ReconcileReport::default();

        for key in self.store.keys() {
            if files.contains_key(&key) {
                continue;
            }
            if let Some(flip) = self.store.discard(&key) {
                report.removed += 1;
                debug!("Dropped setting {key}: no longer persisted");
                self.events.changed(key.as_str());
                self.events.dirty_flag(flip);
            }
        }

        let mut candidates: Vec<&String> = files
            .keys()
            .filter(|name| !is_type_file_name(name))
            .collect();
        candidates.sort();

        for name in candidates {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            report.attempted += 1;
            match self.load_entry(name, &files, cancel).await {
                Ok(Step::Done) => report.succeeded += 1,
                Ok(Step::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Failed to load setting {name}: {e}");
                    self.events.load_failed(name.as_str(), e);
                }
            }
        }

        if report.cancelled {
            info!(
                "Load cancelled after {}/{} settings",
                report.succeeded, report.attempted
            );
        } else {
            info!(
                "Loaded {}/{} settings from {} folder ({} dropped)",
                report.succeeded,
                report.attempted,
                self.folder.backend_name(),
                report.removed
            );
        }
        Ok(report)
    }

    async fn load_entry(
        &self,
        name: &str,
        files: &HashMap<String, Arc<dyn StorageFile>>,
        cancel: &CancellationToken,
    ) -> SettingsResult<Step> {
        let type_file = files
            .get(&type_file_name(name))
            .ok_or_else(|| SettingsError::MissingTypeFile(name.to_string()))?;
        let data_file = &files[name];

        let data = data_file.read_all().await?;
        if cancel.is_cancelled() {
            return Ok(Step::Cancelled);
        }

        let raw_type = type_file.read_all().await?;
        let type_text =
            String::from_utf8(raw_type.to_vec()).map_err(|source| SettingsError::InvalidTypeName {
                key: name.to_string(),
                source,
            })?;
        let type_name = type_text.trim();
        if type_name.is_empty() {
            return Err(SettingsError::BlankTypeName(name.to_string()));
        }
        if !self.registry.contains(type_name) {
            return Err(CodecError::UnknownType(type_name.to_string()).into());
        }
        if cancel.is_cancelled() {
            return Ok(Step::Cancelled);
        }

        let value = self.registry.decode(self.serializer, type_name, &data)?;

        let flip = self.store.set(name, Arc::from(type_name), value, false);
        debug!("Loaded setting {name} ({type_name})");
        self.events.changed(name);
        self.events.dirty_flag(flip);
        Ok(Step::Done)
    }
}
