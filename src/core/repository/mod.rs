// src/core/repository/mod.rs

//! The two-tier cache: response bodies on the filesystem, metadata in the
//! keyspace under `<meta_prefix><fingerprint>` with a native TTL.

pub mod body_store;
pub mod queue;

pub use body_store::BodyStore;
pub use queue::RequestQueue;

use crate::core::errors::BundleCacheError;
use crate::core::keyspace::Keyspace;
use crate::core::model::{CacheMetadata, CachePathInfo, ProxyRequest, ProxyResponse};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// An expired metadata record discovered by a sweep: the keyspace key and the
/// body file it references (empty when the record could not be decoded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredItem {
    pub key: String,
    pub file_path: String,
}

/// Read/write access to cached responses.
#[derive(Debug, Clone)]
pub struct CacheRepository {
    keyspace: Arc<Keyspace>,
    bodies: BodyStore,
    meta_prefix: String,
    scan_page_size: usize,
}

impl CacheRepository {
    pub fn new(
        keyspace: Arc<Keyspace>,
        bodies: BodyStore,
        meta_prefix: String,
        scan_page_size: usize,
    ) -> Self {
        let scan_page_size = if scan_page_size == 0 {
            100
        } else {
            scan_page_size
        };
        Self {
            keyspace,
            bodies,
            meta_prefix,
            scan_page_size,
        }
    }

    pub fn bodies(&self) -> &BodyStore {
        &self.bodies
    }

    /// The keyspace key holding metadata for a fingerprint.
    pub fn meta_key(&self, fingerprint: &str) -> String {
        format!("{}{}", self.meta_prefix, fingerprint)
    }

    fn meta_pattern(&self) -> String {
        format!("{}*", self.meta_prefix)
    }

    /// Looks up a cached response for a request.
    ///
    /// Consistency anomalies never surface to the caller: an expired record,
    /// an undecodable record, or a missing body file all read as a miss, and
    /// the stale record is deleted opportunistically.
    pub async fn lookup(
        &self,
        request: &ProxyRequest,
    ) -> Result<Option<ProxyResponse>, BundleCacheError> {
        let key = self.meta_key(&request.fingerprint());
        let server_expired = self.keyspace.ttl_remaining(&key).is_none();
        let Some(raw) = self.keyspace.peek(&key)? else {
            return Ok(None);
        };

        let metadata: CacheMetadata = match serde_json::from_slice(&raw) {
            Ok(m) => m,
            Err(e) => {
                warn!("Dropping undecodable cache metadata for '{}': {}", key, e);
                self.delete(&key, "").await;
                return Ok(None);
            }
        };

        if server_expired || metadata.is_expired() {
            debug!("Cache record expired at read time: {}", key);
            let file_path = metadata.file_path.clone();
            self.delete(&key, &file_path).await;
            return Ok(None);
        }

        match self.bodies.read(Path::new(&metadata.file_path)).await {
            Ok(Some(body)) => Ok(Some(metadata.into_response(body))),
            Ok(None) => {
                warn!("Cache body missing on disk, dropping record: {}", key);
                self.delete(&key, "").await;
                Ok(None)
            }
            Err(e) => {
                warn!("Cache body read failed for '{}': {}", key, e);
                Ok(None)
            }
        }
    }

    /// Writes a response into both tiers: body file first, then the metadata
    /// record with the keyspace TTL. Ordering means a reader never finds
    /// metadata whose body has not landed yet.
    pub async fn store(
        &self,
        request: &ProxyRequest,
        response: &ProxyResponse,
        ttl: Duration,
    ) -> Result<(), BundleCacheError> {
        let fingerprint = request.fingerprint();
        let path_info = CachePathInfo::derive(&request.url, &response.content_type, &fingerprint)?;
        let file_path = path_info.absolute_under(self.bodies.root());

        self.bodies.write(&file_path, &response.body).await?;

        let metadata = CacheMetadata::for_response(
            response,
            file_path.to_string_lossy().into_owned(),
            ttl,
        );
        let encoded = serde_json::to_vec(&metadata)?;
        self.keyspace
            .set(&self.meta_key(&fingerprint), Bytes::from(encoded), Some(ttl));
        debug!(
            "Cached response for {} ({} bytes) at {}",
            request.url,
            response.body.len(),
            metadata.file_path
        );
        Ok(())
    }

    /// Scans the metadata keyspace for expired records: server-side TTL
    /// elapsed, or a decoded `expires_at` in the past.
    pub async fn scan_expired(&self) -> Result<Vec<ExpiredItem>, BundleCacheError> {
        let keys = self.keyspace.scan_raw(&self.meta_pattern());
        let mut expired = Vec::new();

        for page in keys.chunks(self.scan_page_size) {
            for key in page {
                let server_expired = self.keyspace.ttl_remaining(key).is_none();
                let Some(raw) = self.keyspace.peek(key)? else {
                    continue;
                };
                let file_path = match serde_json::from_slice::<CacheMetadata>(&raw) {
                    Ok(meta) if !server_expired && !meta.is_expired() => continue,
                    Ok(meta) => meta.file_path,
                    // Undecodable and expired server-side: reclaim the key,
                    // the file path is unrecoverable.
                    Err(_) if server_expired => String::new(),
                    Err(_) => continue,
                };
                expired.push(ExpiredItem {
                    key: key.clone(),
                    file_path,
                });
            }
        }
        Ok(expired)
    }

    /// Deletes a metadata record and best-effort removes its body file.
    pub async fn delete(&self, key: &str, file_path: &str) {
        self.keyspace.del(key);
        if !file_path.is_empty()
            && let Err(e) = self.bodies.delete(Path::new(file_path)).await
        {
            warn!("Failed to remove cache body file '{}': {}", file_path, e);
        }
    }

    /// Deletes every metadata record and its body file. Returns the number of
    /// records removed.
    pub async fn purge_all(&self) -> usize {
        let keys = self.keyspace.scan_raw(&self.meta_pattern());
        let mut removed = 0;
        for key in keys {
            let file_path = match self.keyspace.peek(&key) {
                Ok(Some(raw)) => serde_json::from_slice::<CacheMetadata>(&raw)
                    .map(|m| m.file_path)
                    .unwrap_or_default(),
                _ => String::new(),
            };
            self.delete(&key, &file_path).await;
            removed += 1;
        }
        removed
    }
}
