// src/core/gateway/correlation.rs

//! The pending-correlator table: maps in-flight request ids to the single-slot
//! channel of the caller awaiting that response.
//!
//! Entries are single-producer/single-consumer by construction: the receiver
//! loop removes the entry before delivering, so at most one correlator ever
//! exists per request id.

use super::protocol::WireResponse;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Default)]
pub struct PendingTable {
    entries: DashMap<String, oneshot::Sender<WireResponse>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Installs a correlator for `request_id` and returns the receiving slot.
    /// Pair with a [`PendingGuard`] so the entry is removed on every exit path.
    pub fn register(&self, request_id: &str) -> oneshot::Receiver<WireResponse> {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(request_id.to_string(), tx);
        rx
    }

    /// Removes a correlator, if still present.
    pub fn remove(&self, request_id: &str) {
        self.entries.remove(request_id);
    }

    /// Delivers a frame to its waiting correlator, non-blockingly.
    ///
    /// Returns the frame back when no correlator is registered, classifying
    /// it as unsolicited. A correlator whose requester already gave up is
    /// logged and the frame dropped.
    pub fn dispatch(&self, frame: WireResponse) -> Option<WireResponse> {
        match self.entries.remove(&frame.request_id) {
            Some((id, tx)) => {
                if tx.send(frame).is_err() {
                    debug!("Requester gone, dropping correlated response: {}", id);
                }
                None
            }
            None => Some(frame),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Removes the pending-correlator entry when the requester leaves its await,
/// whether by response, timeout, or cancellation.
pub struct PendingGuard<'a> {
    table: &'a PendingTable,
    request_id: &'a str,
}

impl<'a> PendingGuard<'a> {
    pub fn new(table: &'a PendingTable, request_id: &'a str) -> Self {
        Self { table, request_id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(self.request_id);
    }
}
