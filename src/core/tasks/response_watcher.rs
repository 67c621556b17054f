// src/core/tasks/response_watcher.rs

//! Drains the gateway's unsolicited-response channel: late responses whose
//! requester already gave up. Caching them is the point: the DTN round trip
//! already happened, the work must not be wasted.

use crate::core::model::{ProxyRequest, ProxyResponse};
use crate::core::state::ProxyState;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Header the remote end sets so a late response can be tied back to its URL.
pub const ORIGINAL_URL_HEADER: &str = "X-Original-URL";

pub struct ResponseWatcher {
    state: Arc<ProxyState>,
}

impl ResponseWatcher {
    pub fn new(state: Arc<ProxyState>) -> Self {
        Self { state }
    }

    pub async fn run(
        self,
        mut unsolicited_rx: mpsc::Receiver<ProxyResponse>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("Unsolicited response watcher started.");
        loop {
            tokio::select! {
                received = unsolicited_rx.recv() => {
                    match received {
                        Some(response) => self.handle_response(response).await,
                        None => {
                            info!("Unsolicited channel closed, watcher exiting.");
                            return;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Unsolicited response watcher shutting down.");
                    return;
                }
            }
        }
    }

    async fn handle_response(&self, response: ProxyResponse) {
        let Some(url) = response.header(ORIGINAL_URL_HEADER).map(str::to_string) else {
            warn!(
                "Unsolicited response without {} header, cannot cache (status {})",
                ORIGINAL_URL_HEADER, response.status_code
            );
            return;
        };

        if response.status_code != 200 {
            debug!(
                "Dropping unsolicited non-200 response for {} (status {})",
                url, response.status_code
            );
            let _ = self.state.queue.remove_pending(&url);
            return;
        }

        debug!("Caching unsolicited response for {}", url);

        // Reconstruct the request the cache insertion keys off. Late pushes
        // carry GET results.
        let request = ProxyRequest::new("GET", url.clone());
        let ttl = self.state.config.cache.default_ttl;
        match self.state.repository.store(&request, &response, ttl).await {
            Ok(()) => {
                self.state.stats.increment_unsolicited_cached();
                debug!("Unsolicited response cached: {}", url);
            }
            Err(e) => warn!("Failed to cache unsolicited response for {}: {}", url, e),
        }

        if let Err(e) = self.state.queue.remove_pending(&url) {
            warn!("Failed to clear pending mark for {}: {}", url, e);
        }
    }
}
