// src/core/model/mod.rs

//! Core data model: proxied requests and responses, cache metadata, and the
//! deterministic cache path derivation.

pub mod cache_path;
pub mod metadata;
pub mod request;
pub mod response;

pub use cache_path::CachePathInfo;
pub use metadata::CacheMetadata;
pub use request::ProxyRequest;
pub use response::ProxyResponse;

use std::collections::HashMap;

/// HTTP headers as a case-preserving multimap. Lookup helpers below are
/// case-insensitive, matching HTTP semantics.
pub type Headers = HashMap<String, Vec<String>>;

/// Returns the first value of the named header, ignoring case.
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

/// Serde adapter encoding binary bodies as base64 strings, so queue records
/// and wire frames share one representation.
pub(crate) mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
