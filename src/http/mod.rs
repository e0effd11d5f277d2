//! Request and response types at the network boundary
//!
//! The cache never talks to the network itself. It works with the plain
//! [`Request`] and [`Response`] values defined here and forwards misses to a
//! [`Transport`], of which [`HttpClient`] is the reqwest-backed implementation.

mod client;

pub use client::HttpClient;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors that can occur while forwarding a request
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The transport gave up for a reason of its own
    #[error("Network failure: {0}")]
    Failed(String),
}

/// An outgoing request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Full URL including query parameters
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Request {
    /// Creates a request with no headers and no body
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a GET request
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Adds a header, keeping any existing values for the same name
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the request body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the key this request is cached under
    ///
    /// Only the resolved URL counts: two requests with the same URL share an
    /// entry whatever their method, headers or body.
    pub fn cache_key(&self) -> String {
        self.url.as_str().to_string()
    }
}

/// A complete response: status, headers and the fully-read body
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Creates an empty response with the given status
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a response whose body is `value` encoded as JSON
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body))
    }

    /// Adds a header, keeping any existing values for the same name
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the response body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns true for 2xx statuses
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the body as text if it is valid UTF-8
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Parses the body as JSON
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Performs requests on behalf of the cache
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and reads the whole response
    async fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_includes_query() {
        let url = Url::parse("https://example.com/todos?page=2&sort=asc").unwrap();
        let request = Request::get(url);

        assert_eq!(request.cache_key(), "https://example.com/todos?page=2&sort=asc");
    }

    #[test]
    fn test_cache_key_ignores_method_headers_and_body() {
        let url = Url::parse("https://example.com/todos/1").unwrap();
        let get = Request::get(url.clone());
        let post = Request::new(Method::POST, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .body("payload");

        assert_eq!(get.cache_key(), post.cache_key());
    }

    #[test]
    fn test_json_response_sets_content_type() {
        let response = Response::json(StatusCode::OK, &json!({"id": 1})).unwrap();

        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(response.text(), Some(r#"{"id":1}"#));
        assert_eq!(response.parse_json::<serde_json::Value>().unwrap(), json!({"id": 1}));
    }

    #[test]
    fn test_is_success_only_for_2xx() {
        assert!(Response::new(StatusCode::OK).is_success());
        assert!(Response::new(StatusCode::NO_CONTENT).is_success());
        assert!(!Response::new(StatusCode::NOT_MODIFIED).is_success());
        assert!(!Response::new(StatusCode::INTERNAL_SERVER_ERROR).is_success());
    }

    #[test]
    fn test_text_is_none_for_binary_body() {
        let response = Response::new(StatusCode::OK).body(vec![0xff, 0xfe]);
        assert!(response.text().is_none());
    }
}
