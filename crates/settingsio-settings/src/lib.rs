//! SettingsIO Settings - Typed settings cache with per-key persistence
//!
//! [`Settings`] keeps every setting in memory as a type-erased value plus the
//! type tag it is persisted under. Reads and writes never touch storage.
//! `save` writes each changed key as two files in a [`StorageFolder`]
//! (`<key>` holding the encoded value, `<key>.Type` holding the tag) and
//! `load` reconciles the cache against whatever the folder holds.
//!
//! Changes and per-key failures are broadcast as [`SettingsEvent`]s. The
//! aggregate "has unsaved changes" flag is reported as a change of
//! [`HAS_UNSAVED_CHANGES`] whenever it flips.
//!
//! [`StorageFolder`]: settingsio_folder::StorageFolder

pub mod engine;
pub mod entry;
pub mod error;
pub mod events;
pub mod settings;
pub mod store;

pub use engine::ReconcileReport;
pub use entry::SettingEntry;
pub use error::{SettingsError, SettingsResult};
pub use events::{EventBus, SettingsEvent};
pub use settings::Settings;
pub use store::RuntimeStore;

pub use settingsio_common::HAS_UNSAVED_CHANGES;
pub use tokio_util::sync::CancellationToken;
