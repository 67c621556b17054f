// src/server/spawner.rs

//! Spawns all of the server's long-running background tasks.

use super::context::ServerContext;
use super::metrics_server;
use crate::core::tasks::cleanup::CacheSweeperTask;
use crate::core::tasks::persistence::SnapshotSaverTask;
use crate::core::tasks::response_watcher::ResponseWatcher;
use crate::core::tasks::worker_pool::WorkerPool;
use anyhow::{Result, anyhow};
use tracing::info;

/// Spawns all critical background tasks into the context's JoinSet.
pub fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let state = &ctx.state;
    let shutdown_tx = &ctx.shutdown_tx;
    let background_tasks = &mut ctx.background_tasks;

    // --- DTN receiver loop ---
    let gateway = state.gateway.clone();
    let shutdown_rx_gateway = shutdown_tx.subscribe();
    background_tasks.spawn(gateway.run_receiver(shutdown_rx_gateway));

    // --- Fetch pipeline ---
    let worker_pool = WorkerPool::new(state.clone());
    let shutdown_rx_pool = shutdown_tx.subscribe();
    background_tasks.spawn(worker_pool.run(shutdown_rx_pool));

    let unsolicited_rx = ctx
        .unsolicited_rx
        .take()
        .ok_or_else(|| anyhow!("unsolicited channel already taken"))?;
    let response_watcher = ResponseWatcher::new(state.clone());
    let shutdown_rx_watcher = shutdown_tx.subscribe();
    background_tasks.spawn(response_watcher.run(unsolicited_rx, shutdown_rx_watcher));

    // --- Maintenance ---
    let sweeper = CacheSweeperTask::new(state.clone());
    let shutdown_rx_sweeper = shutdown_tx.subscribe();
    background_tasks.spawn(sweeper.run(shutdown_rx_sweeper));

    let snapshot_saver = SnapshotSaverTask::new(state.clone());
    let shutdown_rx_snapshot = shutdown_tx.subscribe();
    background_tasks.spawn(snapshot_saver.run(shutdown_rx_snapshot));

    // --- Metrics server ---
    if state.config.metrics.enabled {
        let metrics_state = state.clone();
        let shutdown_rx_metrics = shutdown_tx.subscribe();
        background_tasks.spawn(metrics_server::run_metrics_server(
            metrics_state,
            shutdown_rx_metrics,
        ));
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    info!("All background tasks have been spawned.");
    Ok(())
}
