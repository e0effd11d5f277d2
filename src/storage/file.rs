//! Persistent storage with one JSON file per key
//!
//! Keys are arbitrary strings (usually URLs), so each file is named after the
//! SHA-256 of its key and carries the original key alongside the value.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use super::{Storage, StorageError};

/// Distinguishes staging files of concurrent writers in this process
static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// On-disk layout of a single item
#[derive(Debug, Serialize, Deserialize)]
struct StoredItem {
    key: String,
    value: String,
}

/// Stores each key as a JSON file inside a namespace directory
///
/// The directory is created lazily on the first write, so opening a storage
/// over a directory that does not exist yet is cheap and reads as empty.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Directory where item files are stored
    dir: PathBuf,
}

impl FileStorage {
    /// Creates a storage over `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Returns the namespace directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path to the item file for the given key
    fn item_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::file_stem(key)))
    }

    /// Returns a unique staging path next to the item file for `key`
    ///
    /// The `.tmp` extension keeps staging files out of `item_files`.
    fn staging_path(&self, key: &str) -> PathBuf {
        let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("{}.{}.{}.tmp", Self::file_stem(key), std::process::id(), n))
    }

    fn file_stem(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    /// Lists item files in a stable order
    async fn item_files(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_item(path: &Path) -> Result<Option<StoredItem>, StorageError> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let item = Self::read_item(&self.item_path(key)).await?;
        // A digest collision would surface a foreign key; treat it as absent.
        Ok(item.filter(|item| item.key == key).map(|item| item.value))
    }

    async fn set_item(&self, key: &str, value: String) -> Result<String, StorageError> {
        fs::create_dir_all(&self.dir).await?;

        let item = StoredItem {
            key: key.to_string(),
            value,
        };
        let json = serde_json::to_string_pretty(&item)?;
        let staging = self.staging_path(key);
        fs::write(&staging, json).await?;
        if let Err(e) = fs::rename(&staging, self.item_path(key)).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        Ok(item.value)
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.item_path(key)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn clear(&self) -> Result<(), StorageError> {
        for path in self.item_files().await? {
            match fs::remove_file(&path).await {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }

    async fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        Ok(self.keys().await?.into_iter().nth(index))
    }

    /// Lists the directory once, skipping files that vanished or do not decode
    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for path in self.item_files().await? {
            match Self::read_item(&path).await {
                Ok(Some(item)) => keys.push(item.key),
                Ok(None) => {}
                Err(StorageError::Malformed(e)) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable item file");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage = FileStorage::new(temp_dir.path().join("cache"));
        (storage, temp_dir)
    }

    #[tokio::test]
    async fn test_set_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache").join("dir");
        let storage = FileStorage::new(nested_path.clone());

        storage
            .set_item("https://example.com/a?b=1", "v".to_string())
            .await
            .expect("Write should succeed");

        assert!(nested_path.exists(), "Nested directory should be created");
    }

    #[tokio::test]
    async fn test_file_contains_key_and_value() {
        let (storage, _temp_dir) = create_test_storage();
        let key = "https://example.com/todos/1";

        storage.set_item(key, "payload".to_string()).await.unwrap();

        let content = std::fs::read_to_string(storage.item_path(key)).expect("Should read file");
        assert!(content.contains("\"key\""));
        assert!(content.contains(key));
        assert!(content.contains("payload"));
    }

    #[tokio::test]
    async fn test_reads_from_missing_directory_are_empty() {
        let (storage, _temp_dir) = create_test_storage();

        assert_eq!(storage.get_item("k").await.unwrap(), None);
        assert_eq!(storage.key(0).await.unwrap(), None);
        storage.remove_item("k").await.expect("Remove should be a no-op");
        storage.clear().await.expect("Clear should be a no-op");
    }

    #[tokio::test]
    async fn test_corrupt_item_is_reported_as_malformed() {
        let (storage, _temp_dir) = create_test_storage();
        storage.set_item("k", "v".to_string()).await.unwrap();
        std::fs::write(storage.item_path("k"), "not json").unwrap();

        let err = storage.get_item("k").await.unwrap_err();
        assert!(matches!(err, StorageError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_clear_leaves_foreign_files_alone() {
        let (storage, _temp_dir) = create_test_storage();
        storage.set_item("k", "v".to_string()).await.unwrap();
        let foreign = storage.dir().join("README.txt");
        std::fs::write(&foreign, "keep me").unwrap();

        storage.clear().await.unwrap();

        assert!(foreign.exists());
        assert_eq!(storage.get_item("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_leaves_no_staging_files() {
        let (storage, _temp_dir) = create_test_storage();

        storage.set_item("k", "one".to_string()).await.unwrap();
        storage.set_item("k", "two".to_string()).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(storage.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", FileStorage::file_stem("k"))]);
        assert_eq!(storage.get_item("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_keys_skip_torn_item_files() {
        let (storage, _temp_dir) = create_test_storage();
        storage.set_item("https://a/1", "v".to_string()).await.unwrap();
        storage.set_item("https://a/2", "v".to_string()).await.unwrap();
        std::fs::write(storage.dir().join("00torn.json"), r#"{"key":"https://a/3","val"#).unwrap();

        let mut keys = storage.keys().await.expect("Torn files should not break listing");
        keys.sort();
        assert_eq!(keys, vec!["https://a/1".to_string(), "https://a/2".to_string()]);
        assert!(storage.key(0).await.unwrap().is_some());
        assert_eq!(storage.key(2).await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_keys_continue_past_vanished_item_files() {
        let (storage, _temp_dir) = create_test_storage();
        storage.set_item("k", "v".to_string()).await.unwrap();
        // Listed by read_dir but gone by the time it is opened
        std::os::unix::fs::symlink(storage.dir().join("gone"), storage.dir().join("00gone.json")).unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["k".to_string()]);
        assert_eq!(storage.key(0).await.unwrap().as_deref(), Some("k"));
    }
}
