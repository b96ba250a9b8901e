//! Settings events
//!
//! Change notifications and per-key failures are broadcast to every
//! subscriber. Emission is synchronous: by the time the emitting call
//! returns, the event sits in each live receiver's buffer.

use crate::error::SettingsError;
use crate::store::Flip;
use settingsio_common::{HAS_UNSAVED_CHANGES, MAX_EVENT_CAPACITY};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Event emitted by [`Settings`](crate::Settings)
#[derive(Debug, Clone)]
pub enum SettingsEvent {
    /// A setting (or `HasUnsavedChanges`) changed
    Changed { name: String },
    /// A persisted setting could not be loaded
    LoadFailed {
        key: String,
        error: Arc<SettingsError>,
    },
    /// A setting could not be saved
    SaveFailed {
        key: String,
        error: Arc<SettingsError>,
    },
}

impl SettingsEvent {
    /// Setting key or property name the event is about
    pub fn name(&self) -> &str {
        match self {
            Self::Changed { name } => name,
            Self::LoadFailed { key, .. } | Self::SaveFailed { key, .. } => key,
        }
    }

    /// Whether this is a load or save failure
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::LoadFailed { .. } | Self::SaveFailed { .. })
    }
}

/// Broadcast fan-out for [`SettingsEvent`]s
pub struct EventBus {
    tx: broadcast::Sender<SettingsEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    ///
    /// The capacity is clamped to `1..=MAX_EVENT_CAPACITY`.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.clamp(1, MAX_EVENT_CAPACITY));
        Self { tx }
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.tx.subscribe()
    }

    fn emit(&self, event: SettingsEvent) {
        trace!(?event, "settings event");
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }

    /// Notify that `name` changed
    pub fn changed(&self, name: impl Into<String>) {
        self.emit(SettingsEvent::Changed { name: name.into() });
    }

    /// Report a per-key load failure
    pub fn load_failed(&self, key: impl Into<String>, error: SettingsError) {
        self.emit(SettingsEvent::LoadFailed {
            key: key.into(),
            error: Arc::new(error),
        });
    }

    /// Notify `HasUnsavedChanges` if `flip` changed the aggregate flag
    pub fn dirty_flag(&self, flip: Flip) {
        if flip.happened() {
            self.changed(HAS_UNSAVED_CHANGES);
        }
    }

    /// Report a per-key save failure
    pub fn save_failed(&self, key: impl Into<String>, error: SettingsError) {
        self.emit(SettingsEvent::SaveFailed {
            key: key.into(),
            error: Arc::new(error),
        });
    }
}
