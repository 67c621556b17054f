// src/core/repository/queue.rs

//! The durable job queue of reserved requests, plus the companion pending-URL
//! set used for deduplication. Both live in the keyspace so reservations
//! survive a restart.

use crate::core::errors::BundleCacheError;
use crate::core::keyspace::Keyspace;
use crate::core::model::ProxyRequest;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RequestQueue {
    keyspace: Arc<Keyspace>,
    reserved_key: String,
    pending_key: String,
}

impl RequestQueue {
    pub fn new(keyspace: Arc<Keyspace>, reserved_key: String, pending_key: String) -> Self {
        Self {
            keyspace,
            reserved_key,
            pending_key,
        }
    }

    /// Reserves a request for a background fetch, deduplicated on the URL.
    ///
    /// Returns `true` when the request was newly enqueued; `false` when a
    /// fetch for the same URL is already in flight and nothing was written.
    pub fn reserve(&self, request: &ProxyRequest) -> Result<bool, BundleCacheError> {
        if !self.add_pending(&request.url)? {
            debug!("Fetch already pending, skipping reservation: {}", request.url);
            return Ok(false);
        }
        let record = serde_json::to_vec(request)?;
        self.enqueue(Bytes::from(record))?;
        Ok(true)
    }

    /// Appends a serialized request record to the queue tail, unconditionally.
    pub fn enqueue(&self, record: Bytes) -> Result<(), BundleCacheError> {
        self.keyspace.rpush(&self.reserved_key, record)?;
        Ok(())
    }

    /// Pops the queue head, blocking up to `timeout`. `None` is a normal
    /// timeout, not an error.
    pub async fn blocking_dequeue(
        &self,
        timeout: Duration,
    ) -> Result<Option<Bytes>, BundleCacheError> {
        self.keyspace.blpop(&self.reserved_key, timeout).await
    }

    /// Removes one occurrence of a record by value. Finalizes a job that was
    /// dispatched; a record already consumed by the pop is a no-op.
    pub fn remove(&self, record: &[u8]) -> Result<usize, BundleCacheError> {
        self.keyspace.lrem(&self.reserved_key, record)
    }

    /// Marks a URL as in flight. Returns `true` iff it was not already marked.
    pub fn add_pending(&self, url: &str) -> Result<bool, BundleCacheError> {
        self.keyspace.sadd(&self.pending_key, url)
    }

    /// Clears the in-flight mark for a URL, re-enabling reservation.
    pub fn remove_pending(&self, url: &str) -> Result<(), BundleCacheError> {
        self.keyspace.srem(&self.pending_key, url)?;
        Ok(())
    }

    pub fn is_pending(&self, url: &str) -> Result<bool, BundleCacheError> {
        self.keyspace.sismember(&self.pending_key, url)
    }

    pub fn len(&self) -> Result<usize, BundleCacheError> {
        self.keyspace.llen(&self.reserved_key)
    }

    pub fn is_empty(&self) -> Result<bool, BundleCacheError> {
        Ok(self.len()? == 0)
    }

    pub fn pending_count(&self) -> Result<usize, BundleCacheError> {
        self.keyspace.scard(&self.pending_key)
    }

    /// Empties both the FIFO and the dedup set. This is the recovery tool for
    /// pending-set leakage after a crash.
    pub fn purge_all(&self) {
        self.keyspace.del(&self.reserved_key);
        self.keyspace.del(&self.pending_key);
    }
}
