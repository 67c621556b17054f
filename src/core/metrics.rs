// src/core/metrics.rs

//! Defines and registers Prometheus metrics for proxy monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only
//! once globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, TextEncoder, register_counter, register_gauge};

lazy_static! {
    // --- Request-plane counters ---
    /// Total inbound requests handled by the proxy surface.
    pub static ref PROXIED_REQUESTS_TOTAL: Counter =
        register_counter!("bundlecache_proxied_requests_total", "Total inbound requests handled.").unwrap();
    /// Requests answered from the cache.
    pub static ref CACHE_HITS_TOTAL: Counter =
        register_counter!("bundlecache_cache_hits_total", "Total cache hits.").unwrap();
    /// Cacheable requests that missed the cache.
    pub static ref CACHE_MISSES_TOTAL: Counter =
        register_counter!("bundlecache_cache_misses_total", "Total cache misses.").unwrap();
    /// Placeholder responses served while a fetch is in flight.
    pub static ref PLACEHOLDERS_SERVED_TOTAL: Counter =
        register_counter!("bundlecache_placeholders_served_total", "Total placeholder responses served.").unwrap();
    /// Uncacheable requests forwarded directly across the link.
    pub static ref DIRECT_FORWARDS_TOTAL: Counter =
        register_counter!("bundlecache_direct_forwards_total", "Total uncacheable requests forwarded directly.").unwrap();

    // --- Bundle-link counters ---
    /// Request bundles sent to the DTN peer.
    pub static ref BUNDLES_SENT_TOTAL: Counter =
        register_counter!("bundlecache_bundles_sent_total", "Total request bundles sent.").unwrap();
    /// Response bundles received from the DTN peer.
    pub static ref BUNDLES_RECEIVED_TOTAL: Counter =
        register_counter!("bundlecache_bundles_received_total", "Total response bundles received.").unwrap();
    /// Late responses that arrived with no waiting correlator and were cached.
    pub static ref UNSOLICITED_CACHED_TOTAL: Counter =
        register_counter!("bundlecache_unsolicited_cached_total", "Total unsolicited responses written to the cache.").unwrap();

    // --- Maintenance counters and gauges ---
    /// Expired cache records removed by the sweeper.
    pub static ref EXPIRED_RECORDS_TOTAL: Counter =
        register_counter!("bundlecache_expired_records_total", "Total expired cache records swept.").unwrap();
    /// Current depth of the reserved-request queue.
    pub static ref QUEUE_DEPTH: Gauge =
        register_gauge!("bundlecache_queue_depth", "Current reserved-request queue depth.").unwrap();
    /// Current size of the pending-URL deduplication set.
    pub static ref PENDING_FETCHES: Gauge =
        register_gauge!("bundlecache_pending_fetches", "Current in-flight URL count.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
