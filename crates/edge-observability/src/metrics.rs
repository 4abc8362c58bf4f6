//! Counters for the cache proxy and the offline queue.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Cache proxy counters.
///
/// Shared by reference between request handlers; every update is a relaxed
/// atomic increment.
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_serves: AtomicU64,
    bypasses: AtomicU64,
    offline_fallbacks: AtomicU64,
    network_errors: AtomicU64,
    cache_errors: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time copy of [`ProxyMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyMetricsSnapshot {
    /// Fresh cache hits.
    pub hits: u64,
    /// Responses that came from the network.
    pub misses: u64,
    /// Stale entries served.
    pub stale_serves: u64,
    /// Requests not handled by a cache rule.
    pub bypasses: u64,
    /// Offline fallback pages served.
    pub offline_fallbacks: u64,
    /// Network failures seen by strategies.
    pub network_errors: u64,
    /// Storage failures that degraded to pass-through.
    pub cache_errors: u64,
    /// Responses written to a partition.
    pub writes: u64,
    /// Entries evicted (after writes and during sweeps).
    pub evictions: u64,
}

impl ProxyMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_serves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_offline_fallback(&self) {
        self.offline_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_error(&self) {
        self.network_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> ProxyMetricsSnapshot {
        ProxyMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_serves: self.stale_serves.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            offline_fallbacks: self.offline_fallbacks.load(Ordering::Relaxed),
            network_errors: self.network_errors.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl ProxyMetricsSnapshot {
    /// Fraction of cache-eligible requests served from cache.
    pub fn hit_ratio(&self) -> f64 {
        let served = self.hits + self.stale_serves;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        [
            format!("hits: {}", self.hits),
            format!("misses: {}", self.misses),
            format!("stale: {}", self.stale_serves),
            format!("bypass: {}", self.bypasses),
            format!("offline fallbacks: {}", self.offline_fallbacks),
            format!("network errors: {}", self.network_errors),
            format!("cache errors: {}", self.cache_errors),
            format!("writes: {}", self.writes),
            format!("evictions: {}", self.evictions),
            format!("hit ratio: {:.1}%", self.hit_ratio() * 100.0),
        ]
        .join("\n")
    }
}

/// Offline queue replay counters, accumulated across drains.
#[derive(Debug, Default)]
pub struct DrainMetrics {
    drains: AtomicU64,
    rejected_drains: AtomicU64,
    replayed: AtomicU64,
    failed_attempts: AtomicU64,
    dropped: AtomicU64,
    last_drain_at: AtomicU64,
}

/// Point-in-time copy of [`DrainMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainMetricsSnapshot {
    /// Completed drain passes.
    pub drains: u64,
    /// Drain triggers ignored because one was already running.
    pub rejected_drains: u64,
    /// Mutations acknowledged by the server.
    pub replayed: u64,
    /// Failed replay attempts.
    pub failed_attempts: u64,
    /// Mutations dropped after exhausting retries.
    pub dropped: u64,
    /// Completion time of the last drain (ms since epoch), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_drain_at: Option<u64>,
}

impl DrainMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished drain pass.
    pub fn record_drain(&self, replayed: usize, failed: usize, dropped: usize, finished_at: u64) {
        self.drains.fetch_add(1, Ordering::Relaxed);
        self.replayed.fetch_add(replayed as u64, Ordering::Relaxed);
        self.failed_attempts.fetch_add(failed as u64, Ordering::Relaxed);
        self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        self.last_drain_at.store(finished_at, Ordering::Relaxed);
    }

    /// Record a drain trigger that found another drain in flight.
    pub fn record_rejected(&self) {
        self.rejected_drains.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> DrainMetricsSnapshot {
        let drains = self.drains.load(Ordering::Relaxed);
        DrainMetricsSnapshot {
            drains,
            rejected_drains: self.rejected_drains.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            last_drain_at: (drains > 0).then(|| self.last_drain_at.load(Ordering::Relaxed)),
        }
    }
}
