//! Runtime store
//!
//! Concurrent key -> entry map backing the facade's fast path. The engine
//! never iterates the live map across an await; it works from
//! [`RuntimeStore::snapshot`] and [`RuntimeStore::keys`].
//!
//! The number of dirty entries is kept in a counter that only changes while
//! the entry's map guard is held. Every mutation reports whether it moved the
//! counter between zero and one, so each change of the aggregate flag is
//! observed by exactly one caller.

use crate::entry::SettingEntry;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use settingsio_codec::SettingValue;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Change of the aggregate dirty flag caused by one mutation
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    /// Flag unchanged
    None,
    /// First dirty entry appeared
    Raised,
    /// Last dirty entry went away
    Cleared,
}

impl Flip {
    /// Whether the flag changed
    pub const fn happened(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// In-memory setting entries
#[derive(Default)]
pub struct RuntimeStore {
    entries: DashMap<String, SettingEntry>,
    /// Entries with `is_dirty` set
    dirty: AtomicUsize,
    /// Next write stamp
    next_version: AtomicU64,
    /// Keys removed through the facade since the last prune
    removed: Mutex<BTreeSet<String>>,
}

impl RuntimeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn stamp(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Account for one entry going from `was` to `now`
    fn track(&self, was: bool, now: bool) -> Flip {
        match (was, now) {
            (false, true) if self.dirty.fetch_add(1, Ordering::SeqCst) == 0 => Flip::Raised,
            (true, false) if self.dirty.fetch_sub(1, Ordering::SeqCst) == 1 => Flip::Cleared,
            _ => Flip::None,
        }
    }

    /// Get a copy of the entry for `key`
    pub fn get(&self, key: &str) -> Option<SettingEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Whether `key` has an entry
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Create or replace the entry for `key`
    pub fn set(&self, key: &str, type_name: Arc<str>, data: SettingValue, dirty: bool) -> Flip {
        let entry = SettingEntry {
            type_name,
            data,
            is_dirty: dirty,
            version: self.stamp(),
        };
        let flip = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let old = occupied.insert(entry);
                self.track(old.is_dirty, dirty)
            }
            Entry::Vacant(vacant) => {
                let flip = self.track(false, dirty);
                vacant.insert(entry);
                flip
            }
        };
        self.removed.lock().remove(key);
        flip
    }

    /// Insert an entry unless one already exists, returning whichever entry
    /// is stored afterwards
    pub fn insert_if_absent(
        &self,
        key: &str,
        type_name: Arc<str>,
        data: SettingValue,
        dirty: bool,
    ) -> (SettingEntry, Flip) {
        let (entry, flip) = match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => (occupied.get().clone(), Flip::None),
            Entry::Vacant(vacant) => {
                let flip = self.track(false, dirty);
                let entry = vacant
                    .insert(SettingEntry {
                        type_name,
                        data,
                        is_dirty: dirty,
                        version: self.stamp(),
                    })
                    .value()
                    .clone();
                (entry, flip)
            }
        };
        self.removed.lock().remove(key);
        (entry, flip)
    }

    fn take(&self, key: &str) -> Option<Flip> {
        let mut flip = Flip::None;
        self.entries
            .remove_if(key, |_, entry| {
                flip = self.track(entry.is_dirty, false);
                true
            })
            .map(|_| flip)
    }

    /// Remove `key` and remember it for pruning
    pub fn remove(&self, key: &str) -> Flip {
        match self.take(key) {
            Some(flip) => {
                self.removed.lock().insert(key.to_string());
                flip
            }
            None => Flip::None,
        }
    }

    /// Remove `key` without remembering it (persisted copy is already gone)
    ///
    /// Returns `None` if there was no entry.
    pub fn discard(&self, key: &str) -> Option<Flip> {
        self.take(key)
    }

    /// Clear the dirty flag if the entry still carries `version`
    pub fn mark_clean(&self, key: &str, version: u64) -> Flip {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.version == version => {
                let was = entry.is_dirty;
                entry.is_dirty = false;
                self.track(was, false)
            }
            _ => Flip::None,
        }
    }

    /// Sorted keys
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Stable copy of every entry, sorted by key
    pub fn snapshot(&self) -> Vec<(String, SettingEntry)> {
        let mut entries: Vec<(String, SettingEntry)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// True iff any entry is dirty
    pub fn has_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst) > 0
    }

    /// Sorted keys of dirty entries
    pub fn dirty_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.is_dirty)
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain the keys removed since the last call
    pub fn take_removed(&self) -> Vec<String> {
        std::mem::take(&mut *self.removed.lock()).into_iter().collect()
    }

    /// Put back a removed key whose pruning failed, unless it was set again
    pub fn restore_removed(&self, key: &str) {
        if !self.contains(key) {
            self.removed.lock().insert(key.to_string());
        }
    }
}
