//! Persisted form of a cached response

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::Response;

/// Errors converting between a live response and its stored form
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Stored status code is out of range
    #[error("Stored status code {0} is invalid")]
    InvalidStatus(u16),

    /// Stored header name or value cannot be rebuilt
    #[error("Stored header '{0}' is invalid")]
    InvalidHeader(String),

    /// Entry could not be encoded to or decoded from JSON
    #[error("Cache entry encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Body bytes as a base64 string
mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

/// A response in a form that is safe to persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedResponse {
    pub status: u16,
    /// Header pairs in order; repeated names appear once per value
    ///
    /// Values are ISO-8859-1 text: each byte is the char with the same code
    /// point, so obs-text bytes survive unchanged.
    pub headers: Vec<(String, String)>,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
}

impl SerializedResponse {
    /// Rebuilds the live response
    pub fn into_response(self) -> Result<Response, SerializationError> {
        let status =
            StatusCode::from_u16(self.status).map_err(|_| SerializationError::InvalidStatus(self.status))?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| SerializationError::InvalidHeader(name.clone()))?;
            let header_value = latin1_bytes(&value)
                .and_then(|bytes| HeaderValue::from_bytes(&bytes).ok())
                .ok_or(SerializationError::InvalidHeader(name))?;
            headers.append(header_name, header_value);
        }

        Ok(Response {
            status,
            headers,
            body: self.body.into(),
        })
    }
}

impl From<&Response> for SerializedResponse {
    fn from(response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .map(|(name, value)| {
                let text = value.as_bytes().iter().map(|&b| char::from(b)).collect();
                (name.as_str().to_string(), text)
            })
            .collect();

        Self {
            status: response.status.as_u16(),
            headers,
            body: response.body.to_vec(),
        }
    }
}

/// Maps ISO-8859-1 text back to bytes; `None` if a char is above U+00FF
fn latin1_bytes(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| u8::try_from(c).ok()).collect()
}

/// The record stored per cached request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL including query parameters
    pub key: String,
    pub value: SerializedResponse,
    /// Absolute expiry, fixed when the entry is written
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: SerializedResponse, expires_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            value,
            expires_at,
        }
    }

    /// An entry is dead from its expiry instant onwards
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Encodes the entry for storage
    pub fn encode(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes an entry read from storage
    pub fn decode(raw: &str) -> Result<Self, SerializationError> {
        Ok(serde_json::from_str(raw)?)
    }
}
