// src/server/context.rs

use crate::core::model::ProxyResponse;
use crate::core::state::ProxyState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

/// Everything the running server needs, assembled during initialization and
/// consumed by the spawner and the HTTP serve loop.
pub struct ServerContext {
    pub state: Arc<ProxyState>,
    pub listener: TcpListener,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<()>,
    /// Taken by the spawner when starting the unsolicited response watcher.
    pub unsolicited_rx: Option<mpsc::Receiver<ProxyResponse>>,
}
