// src/core/model/response.rs

use super::{Headers, base64_bytes, header_value};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A proxied HTTP response, either fetched across the bundle link, read back
/// from the cache, or synthesized as a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, with = "base64_bytes")]
    pub body: Bytes,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content_length: i64,
}

impl ProxyResponse {
    /// Builds a response around a body, filling in the length projection.
    pub fn new(status_code: u16, body: Bytes, content_type: impl Into<String>) -> Self {
        let content_length = body.len() as i64;
        Self {
            status_code,
            headers: Headers::new(),
            body,
            content_type: content_type.into(),
            content_length,
        }
    }

    /// Only plain 200 responses are ever written to the cache.
    pub fn is_cacheable_status(&self) -> bool {
        self.status_code == 200
    }

    /// First value of the named response header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}
