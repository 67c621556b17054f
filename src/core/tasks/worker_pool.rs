// src/core/tasks/worker_pool.rs

//! The fetch pipeline: a queue watcher blocking-pops reserved requests out of
//! the durable queue into an in-memory channel, and N workers drive the
//! gateway round trip and the cache insertion.
//!
//! Workers always clear the reservation, success or not. Clients re-reserve
//! on their next request, so retry loops here would only amplify DTN traffic.

use crate::core::model::ProxyRequest;
use crate::core::state::ProxyState;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// N workers consuming an in-memory channel of capacity 2·N.
pub struct WorkerPool {
    state: Arc<ProxyState>,
}

impl WorkerPool {
    pub fn new(state: Arc<ProxyState>) -> Self {
        Self { state }
    }

    pub async fn run(self, shutdown_rx: broadcast::Receiver<()>) {
        let workers = self.state.config.worker.workers;
        info!("Worker pool starting ({} workers).", workers);

        let (job_tx, job_rx) = mpsc::channel::<Bytes>(workers * 2);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut pool = JoinSet::new();
        for id in 0..workers {
            let state = self.state.clone();
            let job_rx = job_rx.clone();
            pool.spawn(worker_loop(id, state, job_rx));
        }

        let watcher = QueueWatcher::new(self.state.clone());
        watcher.run(job_tx, shutdown_rx).await;

        // Watcher returned on shutdown and dropped the sender; workers drain
        // the channel and exit.
        while pool.join_next().await.is_some() {}
        info!("Worker pool stopped.");
    }
}

async fn worker_loop(id: usize, state: Arc<ProxyState>, job_rx: Arc<Mutex<mpsc::Receiver<Bytes>>>) {
    debug!("Worker {} started.", id);
    loop {
        let job = { job_rx.lock().await.recv().await };
        let Some(record) = job else {
            break;
        };
        process_record(id, &state, record).await;
    }
    debug!("Worker {} exited.", id);
}

/// One dequeued reservation: gateway round trip, cache insertion, finalize.
async fn process_record(id: usize, state: &Arc<ProxyState>, record: Bytes) {
    let request: ProxyRequest = match serde_json::from_slice(&record) {
        Ok(request) => request,
        Err(e) => {
            warn!("Worker {}: dropping undecodable queue record: {}", id, e);
            let _ = state.queue.remove(&record);
            return;
        }
    };

    debug!("Worker {}: fetching {}", id, request.url);

    let response = match state.gateway.proxy_request(&request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Worker {}: fetch failed for {}: {}", id, request.url, e);
            finalize(state, &record, &request.url);
            return;
        }
    };

    if !response.is_cacheable_status() {
        debug!(
            "Worker {}: dropping non-200 response for {} (status {})",
            id, request.url, response.status_code
        );
        finalize(state, &record, &request.url);
        return;
    }

    let ttl = state.config.cache.default_ttl;
    if let Err(e) = state.repository.store(&request, &response, ttl).await {
        warn!("Worker {}: cache store failed for {}: {}", id, request.url, e);
    } else {
        debug!("Worker {}: cached {}", id, request.url);
    }
    finalize(state, &record, &request.url);
}

/// Clears the reservation: the queue record (a no-op after a pop) and the
/// pending mark, so future client requests can re-reserve.
fn finalize(state: &Arc<ProxyState>, record: &[u8], url: &str) {
    if let Err(e) = state.queue.remove(record) {
        warn!("Failed to remove queue record for {}: {}", url, e);
    }
    if let Err(e) = state.queue.remove_pending(url) {
        warn!("Failed to clear pending mark for {}: {}", url, e);
    }
}

/// Blocking-pops the durable queue and feeds the in-memory job channel.
pub struct QueueWatcher {
    state: Arc<ProxyState>,
}

impl QueueWatcher {
    pub fn new(state: Arc<ProxyState>) -> Self {
        Self { state }
    }

    pub async fn run(self, job_tx: mpsc::Sender<Bytes>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Queue watcher started.");
        let timeout = self.state.config.worker.queue_watch_timeout;

        loop {
            let popped = tokio::select! {
                r = self.state.queue.blocking_dequeue(timeout) => r,
                _ = shutdown_rx.recv() => break,
            };

            match popped {
                // Timeout: normal idle tick.
                Ok(None) => continue,
                Ok(Some(record)) => {
                    debug!("Dispatching reserved request to worker pool.");
                    tokio::select! {
                        sent = job_tx.send(record) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                        _ = shutdown_rx.recv() => break,
                    }
                }
                Err(e) => {
                    warn!("Queue watch failed: {}", e);
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
                        _ = shutdown_rx.recv() => break,
                    }
                }
            }
        }
        info!("Queue watcher stopped.");
    }
}
