//! Slim Cache Library
//!
//! An HTTP response cache that decides, per request, whether a live cached
//! response may be served instead of hitting the network. Responses are
//! stored with an absolute expiry over interchangeable storage backends.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use slim_cache::gatekeeper::{Gatekeeper, RequestOptions};
//! use slim_cache::http::{HttpClient, Request};
//! use slim_cache::storage::{BackendId, MemoryStorage};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let gatekeeper = Gatekeeper::new(HttpClient::new())
//!     .with_backend(BackendId::Memory, Arc::new(MemoryStorage::new()));
//!
//! let request = Request::get("https://jsonplaceholder.typicode.com/todos/1".parse()?);
//! let served = gatekeeper.handle(&request, &RequestOptions::cached().ttl(60)).await?;
//! println!("{} from {}", served.response.status, served.origin);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod gatekeeper;
pub mod http;
pub mod storage;

pub use cache::{CacheEntry, CacheError, CacheHelper};
pub use gatekeeper::{Gatekeeper, Origin, RequestOptions, Served};
pub use storage::{open_backend, BackendId, Storage, StorageConfig, StorageError};
