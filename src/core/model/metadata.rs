// src/core/model/metadata.rs

use super::{Headers, ProxyResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache metadata stored in the keyspace, JSON-serialized.
///
/// The keyspace TTL is authoritative; `expires_at` is a belt-and-braces check
/// applied again at read time. Records are immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Filesystem path of the cached body.
    pub file_path: String,
    pub status_code: u16,
    pub headers: Headers,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub content_length: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn is_zero(len: &i64) -> bool {
    *len == 0
}

impl CacheMetadata {
    /// Builds the metadata record for a response about to be cached at
    /// `file_path` with the given lifetime.
    pub fn for_response(response: &ProxyResponse, file_path: String, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(24));
        Self {
            file_path,
            status_code: response.status_code,
            headers: response.headers.clone(),
            content_type: response.content_type.clone(),
            content_length: response.content_length,
            created_at: now,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Reassembles a servable response from this record and its body bytes.
    pub fn into_response(self, body: bytes::Bytes) -> ProxyResponse {
        let content_length = if self.content_length != 0 {
            self.content_length
        } else {
            body.len() as i64
        };
        ProxyResponse {
            status_code: self.status_code,
            headers: self.headers,
            body,
            content_type: self.content_type,
            content_length,
        }
    }
}
