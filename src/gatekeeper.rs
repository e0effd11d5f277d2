//! Per-request cache decision
//!
//! The gatekeeper sits between callers and a [`Transport`]. For each request
//! it reads the request options and either forwards straight to the network
//! (caching disabled), serves a live cached response, or forwards and writes
//! the fresh response back for later requests.
//!
//! Lookup and write-back failures never fail the request: a failed lookup is
//! treated as a miss, and a failed write is reported alongside the response.
//! Network failures are returned unchanged and never cached.

use std::fmt;
use std::sync::Arc;

use crate::cache::{CacheError, CacheHelper, Clock, SystemClock};
use crate::http::{Request, Response, Transport, TransportError};
use crate::storage::{BackendId, Storage, StorageError};

/// TTL used when a request does not carry its own
pub const DEFAULT_TTL_MINUTES: i64 = 1;

/// Caching options passed alongside a request
///
/// The default leaves caching disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Opt-in flag; without it the cache is never touched
    pub cache_enabled: bool,
    /// Backend to use, or the gatekeeper's default when `None`
    pub backend: Option<BackendId>,
    /// TTL for the write-back, or the gatekeeper's default when `None`
    pub ttl_minutes: Option<i64>,
}

impl RequestOptions {
    /// Options that bypass the cache
    pub fn bypass() -> Self {
        Self::default()
    }

    /// Options that opt into the default backend
    pub fn cached() -> Self {
        Self {
            cache_enabled: true,
            ..Self::default()
        }
    }

    /// Selects a backend
    pub fn on(mut self, backend: BackendId) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets the TTL for the write-back
    pub fn ttl(mut self, minutes: i64) -> Self {
        self.ttl_minutes = Some(minutes);
        self
    }
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Caching was disabled for the request
    Bypassed,
    /// A live cache entry
    Cache,
    /// The network, after a cache miss
    Network,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Bypassed => "bypassed",
            Origin::Cache => "cache",
            Origin::Network => "network",
        })
    }
}

/// A response delivered to the caller, with any non-fatal cache failures
#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub origin: Origin,
    /// Lookup failure that was treated as a miss
    pub lookup_error: Option<CacheError>,
    /// Write-back failure after the response was obtained
    pub store_error: Option<CacheError>,
}

impl Served {
    fn new(response: Response, origin: Origin) -> Self {
        Self {
            response,
            origin,
            lookup_error: None,
            store_error: None,
        }
    }
}

/// Decides, per request, between cache and network
pub struct Gatekeeper<T> {
    transport: T,
    /// One helper per registered backend, in registration order
    caches: Vec<(BackendId, CacheHelper)>,
    clock: Arc<dyn Clock>,
    default_ttl_minutes: i64,
}

impl<T: Transport> Gatekeeper<T> {
    /// Creates a gatekeeper with no backends using the system clock
    pub fn new(transport: T) -> Self {
        Self::with_clock(transport, Arc::new(SystemClock))
    }

    /// Creates a gatekeeper with no backends using a custom clock
    pub fn with_clock(transport: T, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            caches: Vec::new(),
            clock,
            default_ttl_minutes: DEFAULT_TTL_MINUTES,
        }
    }

    /// Registers `storage` as the backend named `id`
    ///
    /// The first backend registered becomes the default. Registering an id a
    /// second time replaces the earlier handle.
    pub fn with_backend(mut self, id: BackendId, storage: Arc<dyn Storage>) -> Self {
        let cache = CacheHelper::with_clock(storage, self.clock.clone());
        match self.caches.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = cache,
            None => self.caches.push((id, cache)),
        }
        self
    }

    /// Sets the TTL used when requests carry none
    pub fn with_default_ttl(mut self, minutes: i64) -> Self {
        self.default_ttl_minutes = minutes;
        self
    }

    /// Returns the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the cache bound to `backend`, or to the default backend
    ///
    /// # Errors
    /// * `CacheError::StorageUnavailable` if no matching backend is registered
    pub fn cache(&self, backend: Option<BackendId>) -> Result<&CacheHelper, CacheError> {
        let found = match backend {
            Some(id) => self.caches.iter().find(|(existing, _)| *existing == id),
            None => self.caches.first(),
        };
        found.map(|(_, cache)| cache).ok_or_else(|| {
            let name = backend.map_or_else(|| "default".to_string(), |id| id.to_string());
            StorageError::Unsupported(name).into()
        })
    }

    /// Serves `request` from the cache or the network
    ///
    /// # Errors
    /// * `TransportError` if the request had to be forwarded and failed
    pub async fn handle(&self, request: &Request, options: &RequestOptions) -> Result<Served, TransportError> {
        if !options.cache_enabled {
            tracing::info!(url = %request.url, "Cache is disabled for request");
            let response = self.transport.send(request).await?;
            return Ok(Served::new(response, Origin::Bypassed));
        }

        let key = request.cache_key();
        tracing::info!(url = %key, "Cache is enabled for request");
        let mut lookup_error = None;

        let cache = match self.cache(options.backend) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(error = %e, "No cache backend for request");
                lookup_error = Some(e);
                None
            }
        };

        if let Some(cache) = cache {
            match cache.get(&key).await {
                Ok(Some(response)) => {
                    tracing::debug!(key = %key, "Fetch from cache");
                    return Ok(Served::new(response, Origin::Cache));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Cache lookup failed, treating as miss");
                    lookup_error = Some(e);
                }
            }
        }

        tracing::debug!(key = %key, "Forward request to server");
        let response = self.transport.send(request).await?;

        let mut store_error = None;
        if let Some(cache) = cache {
            if response.is_success() {
                let ttl = options.ttl_minutes.unwrap_or(self.default_ttl_minutes);
                if let Err(e) = cache.set(&key, &response, ttl).await {
                    tracing::warn!(key = %key, error = %e, "Failed to store response in cache");
                    store_error = Some(e);
                }
            } else {
                tracing::debug!(key = %key, status = %response.status, "Not caching unsuccessful response");
            }
        }

        Ok(Served {
            response,
            origin: Origin::Network,
            lookup_error,
            store_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;

    struct NeverCalled;

    #[async_trait]
    impl Transport for NeverCalled {
        async fn send(&self, _request: &Request) -> Result<Response, TransportError> {
            Err(TransportError::Failed("unexpected network call".to_string()))
        }
    }

    #[test]
    fn test_default_options_disable_caching() {
        let options = RequestOptions::default();
        assert!(!options.cache_enabled);
        assert_eq!(options, RequestOptions::bypass());
    }

    #[test]
    fn test_options_builder() {
        let options = RequestOptions::cached().on(BackendId::Durable).ttl(60);
        assert!(options.cache_enabled);
        assert_eq!(options.backend, Some(BackendId::Durable));
        assert_eq!(options.ttl_minutes, Some(60));
    }

    #[test]
    fn test_first_registered_backend_is_default() {
        let gatekeeper = Gatekeeper::new(NeverCalled)
            .with_backend(BackendId::Session, Arc::new(MemoryStorage::new()))
            .with_backend(BackendId::Memory, Arc::new(MemoryStorage::new()));

        let default = gatekeeper.cache(None).unwrap();
        let session = gatekeeper.cache(Some(BackendId::Session)).unwrap();
        assert!(Arc::ptr_eq(default.storage(), session.storage()));
    }

    #[test]
    fn test_unregistered_backend_is_unavailable() {
        let gatekeeper = Gatekeeper::new(NeverCalled);

        let err = gatekeeper.cache(Some(BackendId::Durable)).unwrap_err();
        assert!(matches!(err, CacheError::StorageUnavailable(StorageError::Unsupported(_))));
        assert!(gatekeeper.cache(None).is_err());
    }

    #[test]
    fn test_registering_twice_replaces_handle() {
        let replacement: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let gatekeeper = Gatekeeper::new(NeverCalled)
            .with_backend(BackendId::Memory, Arc::new(MemoryStorage::new()))
            .with_backend(BackendId::Memory, replacement.clone());

        let cache = gatekeeper.cache(Some(BackendId::Memory)).unwrap();
        assert!(Arc::ptr_eq(cache.storage(), &replacement));
    }

    #[tokio::test]
    async fn test_network_failure_propagates_on_miss() {
        let gatekeeper =
            Gatekeeper::new(NeverCalled).with_backend(BackendId::Memory, Arc::new(MemoryStorage::new()));
        let request = Request::get(reqwest::Url::parse("https://example.com/a").unwrap());

        let err = gatekeeper.handle(&request, &RequestOptions::cached()).await.unwrap_err();

        assert!(matches!(err, TransportError::Failed(_)));
        let cache = gatekeeper.cache(None).unwrap();
        assert!(cache.keys().await.unwrap().is_empty(), "Failures are never cached");
    }
}
