// src/server/initialization.rs

//! Handles the complete server initialization process: directories, keyspace
//! snapshot loading, gateway construction, state setup, and the listener.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::gateway;
use crate::core::keyspace::{Keyspace, snapshot};
use crate::core::state::ProxyState;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    prepare_directories(&config).await?;

    let keyspace = Arc::new(Keyspace::new());
    match snapshot::load(&keyspace, Path::new(&config.keyspace.snapshot_path)).await {
        Ok(true) => {}
        Ok(false) => info!("No keyspace snapshot found, starting empty."),
        Err(e) => warn!(
            "Failed to load keyspace snapshot, starting empty: {}. Reservations from the previous run are lost.",
            e
        ),
    }
    // Loading counts as a mutation burst; don't rewrite an identical snapshot.
    keyspace.take_dirty();

    let (bundle_gateway, unsolicited_rx) = gateway::build(&config)
        .await
        .context("Failed to construct the DTN gateway")?;
    info!("DTN gateway ready ({:?} mode).", config.gateway.mode);

    let state = ProxyState::initialize(config, keyspace, bundle_gateway);

    let listener = TcpListener::bind((
        state.config.server.host.as_str(),
        state.config.server.port,
    ))
    .await
    .with_context(|| {
        format!(
            "Failed to bind proxy listener on {}:{}",
            state.config.server.host, state.config.server.port
        )
    })?;
    info!(
        "bundlecache proxy listening on {}:{}",
        state.config.server.host, state.config.server.port
    );

    Ok(ServerContext {
        state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        unsolicited_rx: Some(unsolicited_rx),
    })
}

async fn prepare_directories(config: &Config) -> Result<()> {
    tokio::fs::create_dir_all(&config.cache.dir)
        .await
        .with_context(|| format!("Failed to create cache directory '{}'", config.cache.dir))?;

    if let Some(parent) = Path::new(&config.keyspace.snapshot_path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create snapshot directory '{}'", parent.display())
        })?;
    }
    Ok(())
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Cache: dir='{}', default TTL {:?}, sweep every {:?}",
        config.cache.dir, config.cache.default_ttl, config.cache.cleanup_interval
    );
    info!(
        "Workers: {} (queue watch timeout {:?})",
        config.worker.workers, config.worker.queue_watch_timeout
    );
    if config.tls_intercept.enabled {
        info!(
            "TLS interception material: cert='{}', key='{}'",
            config.tls_intercept.cert_path, config.tls_intercept.key_path
        );
    }
}
