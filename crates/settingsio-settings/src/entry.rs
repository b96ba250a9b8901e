//! Setting entry

use settingsio_codec::SettingValue;
use std::fmt;
use std::sync::Arc;

/// One cached setting
///
/// `version` is stamped by the store on every write. A save records the
/// version it persisted and only clears `is_dirty` if the entry still
/// carries that version, so a value written mid-save stays dirty.
#[derive(Clone)]
pub struct SettingEntry {
    /// Type tag the value is persisted under
    pub type_name: Arc<str>,
    /// Current value
    pub data: SettingValue,
    /// Changed since the last successful save of this key
    pub is_dirty: bool,
    /// Write stamp
    pub version: u64,
}

impl SettingEntry {
    /// Borrow the value as `T`
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for SettingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingEntry")
            .field("type_name", &self.type_name)
            .field("is_dirty", &self.is_dirty)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
