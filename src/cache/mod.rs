//! Response cache over a storage backend
//!
//! This module turns responses into persisted [`CacheEntry`] records with an
//! absolute expiry, and reads them back through a [`CacheHelper`] that
//! invalidates entries lazily: an expired entry is only removed when it is
//! read (or when an optional sweep runs).

mod clock;
mod entry;
mod helper;
mod sweep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, SerializationError, SerializedResponse};
pub use helper::CacheHelper;
pub use sweep::SweepHandle;

use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend failed or is not available
    #[error("Cache storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// A response could not be stored or restored
    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] SerializationError),
}
