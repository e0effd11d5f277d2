//! Durable single-document storage
//!
//! The whole namespace is one JSON object on disk. Every mutation rewrites the
//! document to a sibling temporary file and renames it into place, so a crash
//! mid-write leaves either the old or the new document, never a torn one.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use super::{Storage, StorageError};

type Document = BTreeMap<String, String>;

/// Stores a namespace as a single atomically-replaced JSON document
#[derive(Debug)]
pub struct DocumentStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles issued through this handle
    write_lock: Mutex<()>,
}

impl DocumentStorage {
    /// Creates a storage over the document at `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the document path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Document, StorageError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, document: &Document) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(document)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).await?;
        fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for DocumentStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: String) -> Result<String, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        document.insert(key.to_string(), value.clone());
        self.persist(&document).await?;
        Ok(value)
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        if document.remove(key).is_some() {
            self.persist(&document).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&self.path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        Ok(self.load().await?.into_keys().nth(index))
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.load().await?.into_keys().collect())
    }
}
