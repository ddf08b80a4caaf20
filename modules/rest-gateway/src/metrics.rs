//! Process-wide request metrics.
//!
//! Plain atomics; nothing here takes a lock on the request path except the
//! shard lock of the per-route map on first sight of a route.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

/// Upper bounds of the latency buckets, in milliseconds. Slower requests
/// land in a final overflow bucket.
pub const LATENCY_BUCKETS_MS: [u64; 8] = [5, 10, 25, 50, 100, 250, 1000, 5000];

#[derive(Debug)]
pub struct Metrics {
    requests: AtomicU64,
    refused: AtomicU64,
    routes: DashMap<String, AtomicU64>,
    latency: [AtomicU64; LATENCY_BUCKETS_MS.len() + 1],
    latency_total_ms: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            requests: AtomicU64::new(0),
            refused: AtomicU64::new(0),
            routes: DashMap::new(),
            latency: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_total_ms: AtomicU64::new(0),
        }
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Request turned away because the service is shutting down.
    pub fn record_refused(&self) {
        self.refused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route(&self, route: &str) {
        if let Some(counter) = self.routes.get(route) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.routes
            .entry(route.to_owned())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let idx = LATENCY_BUCKETS_MS
            .iter()
            .position(|bound| ms <= *bound)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.latency[idx].fetch_add(1, Ordering::Relaxed);
        self.latency_total_ms.fetch_add(ms, Ordering::Relaxed);
    }

    #[must_use]
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn refused(&self) -> u64 {
        self.refused.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn route_count(&self, route: &str) -> u64 {
        self.routes
            .get(route)
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    /// Observation count per bucket; the last entry is the overflow bucket.
    #[must_use]
    pub fn latency_histogram(&self) -> Vec<u64> {
        self.latency
            .iter()
            .map(|bucket| bucket.load(Ordering::Relaxed))
            .collect()
    }

    #[must_use]
    pub fn latency_total_ms(&self) -> u64 {
        self.latency_total_ms.load(Ordering::Relaxed)
    }
}
