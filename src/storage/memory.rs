//! Volatile in-process storage

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Storage, StorageError};

/// Keeps every value in an ordered in-memory map
///
/// Contents vanish with the value. Keys enumerate in lexical order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<String, StorageError> {
        self.items.write().await.insert(key.to_string(), value.clone());
        Ok(value)
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.items.write().await.clear();
        Ok(())
    }

    async fn key(&self, index: usize) -> Result<Option<String>, StorageError> {
        Ok(self.items.read().await.keys().nth(index).cloned())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.read().await.keys().cloned().collect())
    }
}
