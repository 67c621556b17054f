// src/core/model/request.rs

//! The normalized representation of an HTTP request travelling through the
//! proxy: from the listener, into the job queue, and across the bundle link.

use super::{Headers, base64_bytes, header_value};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// A proxied HTTP request, decoupled from any HTTP framework types.
///
/// Instances are serialized as JSON into the reserved-request queue, so the
/// field layout is part of the persistent format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, with = "base64_bytes")]
    pub body: Bytes,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content_length: i64,
}

impl ProxyRequest {
    /// Builds a request with headers/body defaults, deriving the convenience
    /// `content_type` projection from the header map.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Headers::new(),
            body: Bytes::new(),
            content_type: String::new(),
            content_length: 0,
        }
    }

    /// A request is cacheable iff it is a `GET` or `HEAD` against a
    /// well-formed absolute URL with a non-empty host. Everything else is
    /// forwarded opaquely and never stored.
    pub fn is_cacheable(&self) -> bool {
        if self.method != "GET" && self.method != "HEAD" {
            return false;
        }
        match Url::parse(&self.url) {
            Ok(parsed) => parsed.host_str().is_some_and(|h| !h.is_empty()),
            Err(_) => false,
        }
    }

    /// The canonical identity of this request: `METHOD|URL`.
    ///
    /// The query string participates in identity because it came with the URL;
    /// fragments never reach the server and are absent by construction.
    pub fn fingerprint(&self) -> String {
        format!("{}|{}", self.method, self.url)
    }

    /// First value of the named request header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}
