//! reqwest-backed transport

use async_trait::async_trait;
use reqwest::Client;

use super::{Request, Response, Transport, TransportError};

/// Forwards requests over HTTP with a shared reqwest client
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HttpClient with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new HttpClient with a custom reqwest client
    ///
    /// Timeouts, proxies and TLS settings belong on the client; the cache
    /// layer adds none of its own.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
