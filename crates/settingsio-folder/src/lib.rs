//! SettingsIO Folder - Storage backends
//!
//! A settings folder is a flat namespace of named files that can be listed,
//! created, read whole and overwritten whole. The reconciliation engine only
//! talks to the [`StorageFolder`] and [`StorageFile`] traits; this crate also
//! ships two backends:
//!
//! - [`FsFolder`]: one file per artifact in a directory (tokio::fs)
//! - [`MemoryFolder`]: an in-process map, used by tests and ephemeral setups

pub mod error;
pub mod folder;
pub mod fs;
pub mod memory;

pub use error::{FolderError, FolderResult};
pub use folder::{StorageFile, StorageFolder, validate_file_name};
pub use fs::{FsFile, FsFolder};
pub use memory::{FolderStats, MemoryFile, MemoryFolder};
