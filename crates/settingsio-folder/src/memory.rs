//! In-memory settings folder
//!
//! Files live in a shared map; handles hold a reference to the map so a
//! write through any handle is visible through every other one.

use crate::error::{FolderError, FolderResult};
use crate::folder::{StorageFile, StorageFolder, validate_file_name};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Folder statistics
#[derive(Debug, Default)]
pub struct FolderStats {
    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub bytes_written: AtomicU64,
}

#[derive(Default)]
struct Shared {
    files: RwLock<BTreeMap<String, Bytes>>,
    stats: FolderStats,
}

/// Settings folder held entirely in memory
///
/// Cloning yields another view of the same folder.
#[derive(Clone, Default)]
pub struct MemoryFolder {
    shared: Arc<Shared>,
}

impl MemoryFolder {
    /// Create a new empty folder
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a file directly, bypassing write accounting
    pub fn insert_file(&self, name: impl Into<String>, data: impl Into<Bytes>) {
        self.shared.files.write().insert(name.into(), data.into());
    }

    /// Remove a file directly, as an external actor would
    pub fn remove_file(&self, name: &str) -> bool {
        self.shared.files.write().remove(name).is_some()
    }

    /// Current contents of a file
    pub fn read_file(&self, name: &str) -> Option<Bytes> {
        self.shared.files.read().get(name).cloned()
    }

    /// Sorted names of every file
    pub fn file_names(&self) -> Vec<String> {
        self.shared.files.read().keys().cloned().collect()
    }

    /// Number of completed `write_all` calls
    pub fn write_count(&self) -> u64 {
        self.shared.stats.writes.load(Ordering::Relaxed)
    }

    /// Get statistics
    pub fn stats(&self) -> &FolderStats {
        &self.shared.stats
    }

    fn handle(&self, name: &str) -> Arc<dyn StorageFile> {
        Arc::new(MemoryFile {
            name: name.to_string(),
            shared: Arc::clone(&self.shared),
        })
    }
}

#[async_trait]
impl StorageFolder for MemoryFolder {
    async fn list_files(&self) -> FolderResult<Vec<Arc<dyn StorageFile>>> {
        let names = self.file_names();
        Ok(names.iter().map(|name| self.handle(name)).collect())
    }

    async fn create_or_open_file(&self, name: &str) -> FolderResult<Arc<dyn StorageFile>> {
        validate_file_name(name)?;
        self.shared
            .files
            .write()
            .entry(name.to_string())
            .or_default();
        Ok(self.handle(name))
    }

    async fn delete_file(&self, name: &str) -> FolderResult<bool> {
        validate_file_name(name)?;
        Ok(self.remove_file(name))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Handle to one file inside a [`MemoryFolder`]
pub struct MemoryFile {
    name: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl StorageFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_all(&self) -> FolderResult<Bytes> {
        self.shared.stats.reads.fetch_add(1, Ordering::Relaxed);
        self.shared
            .files
            .read()
            .get(&self.name)
            .cloned()
            .ok_or_else(|| FolderError::NotFound(self.name.clone()))
    }

    async fn write_all(&self, data: Bytes) -> FolderResult<()> {
        let len = data.len() as u64;
        self.shared.files.write().insert(self.name.clone(), data);
        self.shared.stats.writes.fetch_add(1, Ordering::Relaxed);
        self.shared
            .stats
            .bytes_written
            .fetch_add(len, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handles_share_state() {
        let folder = MemoryFolder::new();
        let a = folder.create_or_open_file("volume").await.unwrap();
        let b = folder.create_or_open_file("volume").await.unwrap();

        a.write_all(Bytes::from_static(b"11")).await.unwrap();
        assert_eq!(b.read_all().await.unwrap(), Bytes::from_static(b"11"));
        assert_eq!(folder.write_count(), 1);
        assert_eq!(folder.stats().bytes_written.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_create_keeps_existing_content() {
        let folder = MemoryFolder::new();
        folder.insert_file("theme", "\"dark\"");

        let file = folder.create_or_open_file("theme").await.unwrap();
        assert_eq!(file.read_all().await.unwrap(), Bytes::from_static(b"\"dark\""));
    }

    #[tokio::test]
    async fn test_list_and_remove() {
        let folder = MemoryFolder::new();
        folder.insert_file("b", "2");
        folder.insert_file("a", "1");

        let listed: Vec<String> = folder
            .list_files()
            .await
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(listed, vec!["a".to_string(), "b".to_string()]);

        assert!(folder.delete_file("a").await.unwrap());
        assert!(!folder.delete_file("a").await.unwrap());
        assert_eq!(folder.file_names(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_read_removed_file() {
        let folder = MemoryFolder::new();
        let file = folder.create_or_open_file("x").await.unwrap();
        folder.remove_file("x");
        assert!(matches!(
            file.read_all().await,
            Err(FolderError::NotFound(ref name)) if name == "x"
        ));
    }
}
