// src/core/state/mod.rs

//! Defines the central `ProxyState` struct, holding all shared state passed
//! to the HTTP adapters and background tasks.

pub mod stats;

use crate::config::Config;
use crate::core::gateway::BundleGateway;
use crate::core::keyspace::Keyspace;
use crate::core::repository::{BodyStore, CacheRepository, RequestQueue};
use crate::core::service::{PlaceholderProvider, ProxyService};
use stats::StatsState;
use std::sync::Arc;

/// The central struct holding all shared proxy-wide state. Wrapped in an
/// `Arc` and handed to every task and request handler.
#[derive(Debug)]
pub struct ProxyState {
    pub config: Config,
    pub keyspace: Arc<Keyspace>,
    pub repository: CacheRepository,
    pub queue: RequestQueue,
    pub gateway: Arc<dyn BundleGateway>,
    pub service: ProxyService,
    pub stats: Arc<StatsState>,
}

impl ProxyState {
    /// Assembles the shared state from an initialized keyspace and gateway.
    pub fn initialize(
        config: Config,
        keyspace: Arc<Keyspace>,
        gateway: Arc<dyn BundleGateway>,
    ) -> Arc<Self> {
        let bodies = BodyStore::new(&config.cache.dir);
        let repository = CacheRepository::new(
            keyspace.clone(),
            bodies,
            config.keyspace.cache_meta_prefix.clone(),
            config.keyspace.scan_count,
        );
        let queue = RequestQueue::new(
            keyspace.clone(),
            config.keyspace.reserved_requests_key.clone(),
            config.keyspace.pending_requests_key.clone(),
        );
        let placeholders = PlaceholderProvider::new(
            &config.placeholder.dir,
            config.placeholder.default_file.as_str(),
        );
        let stats = Arc::new(StatsState::new());
        let service = ProxyService::new(
            repository.clone(),
            queue.clone(),
            gateway.clone(),
            placeholders,
            stats.clone(),
            config.cache.default_ttl,
        );

        Arc::new(Self {
            config,
            keyspace,
            repository,
            queue,
            gateway,
            service,
            stats,
        })
    }

    /// Drops every cache record, body file reference, queued reservation and
    /// pending mark. The admin surface's purge operation.
    pub async fn purge_all(&self) -> usize {
        let removed = self.repository.purge_all().await;
        self.queue.purge_all();
        removed
    }
}
