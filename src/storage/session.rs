//! Session-scoped storage
//!
//! Behaves like [`FileStorage`] but lives in a private temporary directory
//! that is deleted when the session value is dropped.

use std::path::Path;

use async_trait::async_trait;
use tempfile::TempDir;

use super::{FileStorage, Storage, StorageError};

/// Storage whose contents last exactly as long as the value itself
#[derive(Debug)]
pub struct SessionStorage {
    files: FileStorage,
    // Field order matters: the directory must outlive `files`.
    dir: TempDir,
}

impl SessionStorage {
    /// Creates a session in a fresh temporary directory
    pub fn new() -> Result<Self, StorageError> {
        let dir = tempfile::Builder::new().prefix("slim-session-").tempdir()?;
        let files = FileStorage::new(dir.path().to_path_buf());
        Ok(Self { files, dir })
    }

    /// Returns the directory backing this session
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[async_trait]
impl Storage for SessionStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.files.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: String) -> Result<String, StorageError> {
        self.files.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.files.remove_item(key).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.files.clear().await
    }

    async fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        self.files.key(index).await
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.files.keys().await
    }
}
