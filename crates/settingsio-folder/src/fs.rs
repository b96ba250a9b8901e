//! Filesystem-backed settings folder
//!
//! Each artifact is a regular file directly inside the root directory.
//! Writes truncate, write, flush and fsync before returning.

use crate::error::{FolderError, FolderResult};
use crate::folder::{StorageFile, StorageFolder, validate_file_name};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Settings folder over a local directory
#[derive(Debug, Clone)]
pub struct FsFolder {
    root: PathBuf,
}

impl FsFolder {
    /// Open (or create) the folder at `root`
    pub async fn open(root: impl AsRef<Path>) -> FolderResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| FolderError::io(root.display().to_string(), e))?;
        debug!("Opened settings folder at {}", root.display());
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn handle(&self, name: &str) -> Arc<dyn StorageFile> {
        Arc::new(FsFile {
            name: name.to_string(),
            path: self.root.join(name),
        })
    }
}

#[async_trait]
impl StorageFolder for FsFolder {
    async fn list_files(&self) -> FolderResult<Vec<Arc<dyn StorageFile>>> {
        let root_name = self.root.display().to_string();
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| FolderError::io(&root_name, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FolderError::io(&root_name, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| FolderError::io(&root_name, e))?;
            if !file_type.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => files.push(self.handle(&name)),
                Err(raw) => warn!("Skipping non UTF-8 file name in settings folder: {raw:?}"),
            }
        }

        Ok(files)
    }

    async fn create_or_open_file(&self, name: &str) -> FolderResult<Arc<dyn StorageFile>> {
        validate_file_name(name)?;
        let path = self.root.join(name);
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| FolderError::io(name, e))?;
        Ok(self.handle(name))
    }

    async fn delete_file(&self, name: &str) -> FolderResult<bool> {
        validate_file_name(name)?;
        match fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FolderError::io(name, e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "fs"
    }
}

/// Handle to one file inside an [`FsFolder`]
#[derive(Debug, Clone)]
pub struct FsFile {
    name: String,
    path: PathBuf,
}

impl FsFile {
    /// Full path on disk
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StorageFile for FsFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_all(&self) -> FolderResult<Bytes> {
        match fs::read(&self.path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FolderError::NotFound(self.name.clone()))
            }
            Err(e) => Err(FolderError::io(&self.name, e)),
        }
    }

    async fn write_all(&self, data: Bytes) -> FolderResult<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .await
            .map_err(|e| FolderError::io(&self.name, e))?;

        file.write_all(&data)
            .await
            .map_err(|e| FolderError::io(&self.name, e))?;
        file.flush()
            .await
            .map_err(|e| FolderError::io(&self.name, e))?;
        file.sync_data()
            .await
            .map_err(|e| FolderError::io(&self.name, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_folder() -> (TempDir, FsFolder) {
        let dir = TempDir::new().unwrap();
        let folder = FsFolder::open(dir.path().join("settings")).await.unwrap();
        (dir, folder)
    }

    #[tokio::test]
    async fn test_create_write_read() {
        let (_dir, folder) = test_folder().await;

        let file = folder.create_or_open_file("theme").await.unwrap();
        assert_eq!(file.name(), "theme");
        assert!(file.read_all().await.unwrap().is_empty());

        file.write_all(Bytes::from_static(b"\"dark\"")).await.unwrap();
        assert_eq!(file.read_all().await.unwrap(), Bytes::from_static(b"\"dark\""));
    }

    #[tokio::test]
    async fn test_write_truncates() {
        let (_dir, folder) = test_folder().await;

        let file = folder.create_or_open_file("width").await.unwrap();
        file.write_all(Bytes::from_static(b"123456789")).await.unwrap();
        file.write_all(Bytes::from_static(b"42")).await.unwrap();

        let reopened = folder.create_or_open_file("width").await.unwrap();
        assert_eq!(reopened.read_all().await.unwrap(), Bytes::from_static(b"42"));
    }

    #[tokio::test]
    async fn test_list_skips_directories() {
        let (_dir, folder) = test_folder().await;

        folder.create_or_open_file("a").await.unwrap();
        folder.create_or_open_file("a.Type").await.unwrap();
        std::fs::create_dir(folder.root().join("nested")).unwrap();

        let mut names: Vec<String> = folder
            .list_files()
            .await
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "a.Type".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (_dir, folder) = test_folder().await;

        folder.create_or_open_file("gone").await.unwrap();
        assert!(folder.delete_file("gone").await.unwrap());
        assert!(!folder.delete_file("gone").await.unwrap());
        assert!(folder.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_names() {
        let (_dir, folder) = test_folder().await;

        let result = folder.create_or_open_file("../outside").await;
        assert!(matches!(result, Err(FolderError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let (_dir, folder) = test_folder().await;

        let file = folder.create_or_open_file("short-lived").await.unwrap();
        folder.delete_file("short-lived").await.unwrap();
        let err = file.read_all().await.unwrap_err();
        assert!(matches!(err, FolderError::NotFound(ref name) if name == "short-lived"));
    }
}
