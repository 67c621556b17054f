// src/core/service/mod.rs

//! The per-request decision ladder: serve from cache, reserve-and-placeholder,
//! or forward directly for uncacheable requests.

pub mod placeholder;

pub use placeholder::{PlaceholderKind, PlaceholderProvider};

use crate::core::errors::BundleCacheError;
use crate::core::gateway::BundleGateway;
use crate::core::model::{ProxyRequest, ProxyResponse};
use crate::core::repository::{CacheRepository, RequestQueue};
use crate::core::state::stats::StatsState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ProxyService {
    repository: CacheRepository,
    queue: RequestQueue,
    gateway: Arc<dyn BundleGateway>,
    placeholders: PlaceholderProvider,
    stats: Arc<StatsState>,
    default_ttl: Duration,
}

impl ProxyService {
    pub fn new(
        repository: CacheRepository,
        queue: RequestQueue,
        gateway: Arc<dyn BundleGateway>,
        placeholders: PlaceholderProvider,
        stats: Arc<StatsState>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            repository,
            queue,
            gateway,
            placeholders,
            stats,
            default_ttl,
        }
    }

    /// Handles one inbound request.
    ///
    /// The only error this returns is a transport failure on the
    /// direct-forward path for uncacheable requests; the HTTP adapter maps it
    /// to a 502. Cacheable requests always get a response: cached content or
    /// a placeholder. Storage problems read as misses, never as errors.
    pub async fn handle(
        &self,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse, BundleCacheError> {
        if !request.is_cacheable() {
            debug!(
                "Uncacheable request, forwarding directly: {} {}",
                request.method, request.url
            );
            self.stats.increment_direct_forwards();
            return self.gateway.proxy_request(request).await;
        }

        match self.repository.lookup(request).await {
            Ok(Some(cached)) => {
                debug!("Cache hit: {}", request.url);
                self.stats.increment_hits();
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Cache lookup failed, treating as miss: {}", e);
            }
        }

        debug!("Cache miss, reserving fetch: {}", request.url);
        self.stats.increment_misses();

        match self.queue.reserve(request) {
            Ok(true) => debug!("Reserved request for background fetch: {}", request.url),
            Ok(false) => {}
            Err(e) => warn!("Failed to reserve request '{}': {}", request.url, e),
        }

        self.stats.increment_placeholders();
        Ok(self.placeholders.response_for(&request.url).await)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}
