//! Storage folder traits
//!
//! This module defines the abstraction over where settings artifacts live,
//! so the engine can persist to a directory, memory, or anything else that
//! can list, create and overwrite named files.

use crate::error::{FolderError, FolderResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// A single named file inside a [`StorageFolder`]
///
/// Handles are cheap and carry no open OS resources between calls; every
/// operation opens, uses and closes the underlying file.
#[async_trait]
pub trait StorageFile: Send + Sync {
    /// File name within the folder
    fn name(&self) -> &str;

    /// Read the full contents
    async fn read_all(&self) -> FolderResult<Bytes>;

    /// Replace the full contents (truncate, then write)
    async fn write_all(&self, data: Bytes) -> FolderResult<()>;
}

/// A flat folder of named files
#[async_trait]
pub trait StorageFolder: Send + Sync {
    /// List every file currently in the folder
    async fn list_files(&self) -> FolderResult<Vec<Arc<dyn StorageFile>>>;

    /// Open `name`, creating it empty if it does not exist
    async fn create_or_open_file(&self, name: &str) -> FolderResult<Arc<dyn StorageFile>>;

    /// Delete `name`
    ///
    /// Returns `Ok(false)` if the file was already absent.
    async fn delete_file(&self, name: &str) -> FolderResult<bool>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Check that `name` is a plain file name with no path components
pub fn validate_file_name(name: &str) -> FolderResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(FolderError::InvalidName(name.to_string()));
    }
    Ok(())
}
