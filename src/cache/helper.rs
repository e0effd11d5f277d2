//! Cache helper binding entries to one storage handle

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{CacheEntry, CacheError, Clock, SerializedResponse, SystemClock};
use crate::http::Response;
use crate::storage::Storage;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Reads and writes cached responses in a single storage namespace
///
/// A helper is bound to one storage handle for its whole lifetime. Using a
/// different backend means building a new helper. Cloning is cheap and the
/// clones share the same storage and clock.
#[derive(Debug, Clone)]
pub struct CacheHelper {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl CacheHelper {
    /// Creates a helper over `storage` using the system clock
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    /// Creates a helper over `storage` with a custom clock
    pub fn with_clock(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Returns the bound storage handle
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Saves `response` under `key` for `ttl_minutes`
    ///
    /// The expiry instant is computed once, here, and never extended by reads.
    /// A TTL of zero or less produces an entry that is already expired on the
    /// next read. Any previous entry for `key` is replaced.
    ///
    /// # Errors
    /// * `CacheError::Serialization` if the entry cannot be encoded
    /// * `CacheError::StorageUnavailable` if the backend write fails
    pub async fn set(&self, key: &str, response: &Response, ttl_minutes: i64) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key, SerializedResponse::from(response), self.time_to_live(ttl_minutes));

        self.storage.set_item(key, entry.encode()?).await?;
        tracing::debug!(key, expires_at = %entry.expires_at, "Stored response in cache");
        Ok(())
    }

    /// Retrieves the live response cached under `key`
    ///
    /// Returns `Ok(None)` when nothing is cached. An expired entry is deleted
    /// from storage and also reported as `None`.
    pub async fn get(&self, key: &str) -> Result<Option<Response>, CacheError> {
        let Some(raw) = self.storage.get_item(key).await? else {
            return Ok(None);
        };

        let entry = CacheEntry::decode(&raw)?;
        if entry.is_expired(self.clock.now()) {
            self.invalidate(key).await?;
            return Ok(None);
        }

        Ok(Some(entry.value.into_response()?))
    }

    /// Clears out the entire namespace, including entries written by others
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.storage.clear().await?;
        tracing::debug!("Cleared cache namespace");
        Ok(())
    }

    /// Lists every key in the namespace
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.storage.keys().await?)
    }

    /// Removes every expired entry and returns how many were removed
    ///
    /// Values that do not decode as cache entries are left untouched, since
    /// the namespace may be shared with other writers.
    pub async fn sweep(&self) -> Result<usize, CacheError> {
        let now = self.clock.now();
        let mut removed = 0;

        for key in self.keys().await? {
            let Some(raw) = self.storage.get_item(&key).await? else {
                continue;
            };
            match CacheEntry::decode(&raw) {
                Ok(entry) if entry.is_expired(now) => {
                    self.invalidate(&key).await?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(key = %key, error = %e, "Skipping value that is not a cache entry"),
            }
        }

        Ok(removed)
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.storage.remove_item(key).await?;
        tracing::debug!(key, "Invalidated expired cache entry");
        Ok(())
    }

    /// Converts a TTL in minutes to an absolute expiry at millisecond resolution
    fn time_to_live(&self, minutes: i64) -> DateTime<Utc> {
        let millis = self
            .clock
            .now()
            .timestamp_millis()
            .saturating_add(minutes.saturating_mul(MILLIS_PER_MINUTE));

        DateTime::from_timestamp_millis(millis).unwrap_or(if minutes < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
    }
}
