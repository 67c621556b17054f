// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;

mod context;
mod http;
mod initialization;
mod metrics_server;
mod spawner;

pub use context::ServerContext;
pub use http::router;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Initialize keyspace, gateway, state, and the listener.
    let mut server_context = initialization::setup(config).await?;

    // 2. Spawn all background tasks.
    spawner::spawn_all(&mut server_context)?;

    // 3. Serve the proxy surface until shutdown.
    http::serve(server_context).await
}
