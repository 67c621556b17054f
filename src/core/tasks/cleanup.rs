// src/core/tasks/cleanup.rs

//! Periodic sweep of expired cache metadata and the body files they
//! reference.

use crate::core::metrics;
use crate::core::state::ProxyState;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub struct CacheSweeperTask {
    state: Arc<ProxyState>,
}

impl CacheSweeperTask {
    pub fn new(state: Arc<ProxyState>) -> Self {
        Self { state }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Cache sweeper started.");
        let mut interval = tokio::time::interval(self.state.config.cache.cleanup_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Cache sweeper shutting down.");
                    return;
                }
            }
        }
    }

    /// One sweep cycle. Errors are logged and non-fatal.
    async fn sweep(&self) {
        let expired = match self.state.repository.scan_expired().await {
            Ok(expired) => expired,
            Err(e) => {
                warn!("Expired-record scan failed: {}", e);
                return;
            }
        };

        if expired.is_empty() {
            debug!("Sweep cycle complete, nothing expired.");
            return;
        }

        let count = expired.len();
        for item in expired {
            self.state.repository.delete(&item.key, &item.file_path).await;
        }
        metrics::EXPIRED_RECORDS_TOTAL.inc_by(count as f64);
        info!("Swept {} expired cache records.", count);
    }
}
