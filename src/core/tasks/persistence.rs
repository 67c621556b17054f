// src/core/tasks/persistence.rs

//! Periodically snapshots the keyspace to disk so reservations and the
//! deduplication set survive a restart, plus a final save at shutdown.

use crate::core::keyspace::snapshot;
use crate::core::state::ProxyState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub struct SnapshotSaverTask {
    state: Arc<ProxyState>,
}

impl SnapshotSaverTask {
    pub fn new(state: Arc<ProxyState>) -> Self {
        Self { state }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Keyspace snapshot saver started.");
        let path = PathBuf::from(&self.state.config.keyspace.snapshot_path);
        let mut interval =
            tokio::time::interval(self.state.config.keyspace.snapshot_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.save_if_dirty(&path).await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Snapshot saver shutting down, writing final snapshot.");
                    if let Err(e) = snapshot::save(&self.state.keyspace, &path).await {
                        warn!("Final keyspace snapshot failed: {}", e);
                    }
                    return;
                }
            }
        }
    }

    async fn save_if_dirty(&self, path: &std::path::Path) {
        let dirty = self.state.keyspace.take_dirty();
        if dirty == 0 {
            return;
        }
        match snapshot::save(&self.state.keyspace, path).await {
            Ok(()) => debug!("Keyspace snapshot written ({} mutations).", dirty),
            Err(e) => warn!("Keyspace snapshot failed: {}", e),
        }
    }
}
