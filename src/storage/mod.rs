//! Storage contract for cached responses
//!
//! This module defines the asynchronous key-value contract the cache runs on,
//! together with the four interchangeable backends that implement it:
//! volatile in-process memory, persistent files, a session-scoped directory
//! that disappears with the session, and a single-document durable store.
//!
//! Values are opaque serialized strings. Operations on distinct keys are
//! independent; concurrent operations on the same key inherit whatever
//! atomicity the backend naturally has.

mod document;
mod file;
mod memory;
mod session;

pub use document::DocumentStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use session::SessionStorage;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend failed to read or write its medium
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Data on disk could not be decoded
    #[error("Stored data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The requested backend is not available
    #[error("Storage backend not supported: {0}")]
    Unsupported(String),
}

/// Asynchronous key-value storage over string keys and serialized values
///
/// A missing key is never an error: `get_item` returns `None` and
/// `remove_item` is a no-op. Errors are reserved for backend failures.
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Returns the value stored under `key`, or `None` if absent
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value, and returns it
    async fn set_item(&self, key: &str, value: String) -> Result<String, StorageError>;

    /// Deletes `key` if present
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Deletes every key in the namespace
    async fn clear(&self) -> Result<(), StorageError>;

    /// Returns the name of the `index`-th key, or `None` past the end
    ///
    /// Only meant for diagnostics and sweeping; the order is backend-defined
    /// and shifts when keys are added or removed.
    async fn key(&self, index: usize) -> Result<Option<String>, StorageError>;

    /// Returns every key in the namespace
    ///
    /// The default walks `key(index)` until it runs out. Backends that can
    /// list their keys in one pass override it.
    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        while let Some(key) = self.key(keys.len()).await? {
            keys.push(key);
        }
        Ok(keys)
    }
}

/// Identifies one of the interchangeable storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Volatile in-process map
    Memory,
    /// One file per key under the cache directory
    Persistent,
    /// Temporary directory removed when the session ends
    Session,
    /// Single JSON document under the cache directory
    Durable,
}

impl BackendId {
    /// All backends, in declaration order
    pub const ALL: [BackendId; 4] = [
        BackendId::Memory,
        BackendId::Persistent,
        BackendId::Session,
        BackendId::Durable,
    ];

    /// Returns the lowercase name of the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Memory => "memory",
            BackendId::Persistent => "persistent",
            BackendId::Session => "session",
            BackendId::Durable => "durable",
        }
    }

    /// Whether the backend keeps its data under `StorageConfig::root`
    pub fn is_on_disk(&self) -> bool {
        matches!(self, BackendId::Persistent | BackendId::Durable)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StorageError::Unsupported(s.to_string()))
    }
}

/// Where disk-backed storages keep their data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Root directory shared by the persistent and durable backends
    pub root: PathBuf,
    /// Partition name inside the root
    pub namespace: String,
}

impl StorageConfig {
    /// Default namespace, shared by every backend unless overridden
    pub const DEFAULT_NAMESPACE: &'static str = "cache";

    /// Creates a config using the XDG-compliant cache directory
    ///
    /// Uses `~/.cache/slim/` on Linux, or the equivalent path on other platforms.
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn from_project_dirs() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "slim")?;
        Some(Self::with_root(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates a config rooted at a custom directory
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            namespace: Self::DEFAULT_NAMESPACE.to_string(),
        }
    }

    /// Replaces the namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

/// Opens a fresh handle on the backend named by `id`
///
/// Called once at the call site that owns the cache; the returned handle is
/// then bound to a `CacheHelper` for its whole lifetime.
///
/// # Errors
/// * `StorageError::Io` if the session directory cannot be created
pub fn open_backend(id: BackendId, config: &StorageConfig) -> Result<Arc<dyn Storage>, StorageError> {
    let storage: Arc<dyn Storage> = match id {
        BackendId::Memory => Arc::new(MemoryStorage::new()),
        BackendId::Persistent => Arc::new(FileStorage::new(config.root.join(&config.namespace))),
        BackendId::Session => Arc::new(SessionStorage::new()?),
        BackendId::Durable => Arc::new(DocumentStorage::new(
            config.root.join(format!("{}.db.json", config.namespace)),
        )),
    };
    tracing::debug!(backend = %id, namespace = %config.namespace, "Opened storage backend");
    Ok(storage)
}
