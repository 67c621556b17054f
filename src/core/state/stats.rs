// src/core/state/stats.rs

//! Holds proxy-wide statistics counters.

use crate::core::metrics;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cheap atomic counters mirrored into the Prometheus registry.
#[derive(Debug, Default)]
pub struct StatsState {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub placeholders_served: AtomicU64,
    pub direct_forwards: AtomicU64,
    pub unsolicited_cached: AtomicU64,
}

impl StatsState {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_HITS_TOTAL.inc();
    }

    pub fn increment_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_MISSES_TOTAL.inc();
    }

    pub fn increment_placeholders(&self) {
        self.placeholders_served.fetch_add(1, Ordering::Relaxed);
        metrics::PLACEHOLDERS_SERVED_TOTAL.inc();
    }

    pub fn increment_direct_forwards(&self) {
        self.direct_forwards.fetch_add(1, Ordering::Relaxed);
        metrics::DIRECT_FORWARDS_TOTAL.inc();
    }

    pub fn increment_unsolicited_cached(&self) {
        self.unsolicited_cached.fetch_add(1, Ordering::Relaxed);
        metrics::UNSOLICITED_CACHED_TOTAL.inc();
    }
}
