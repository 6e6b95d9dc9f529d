//! Cache Statistics Module
//!
//! Snapshot of cache occupancy plus hit/miss and removal counters.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries that are live (not yet past their expiry)
    pub size: usize,
    /// Capacity bound
    pub max_size: usize,
    /// Default TTL in milliseconds
    pub ttl_default_ms: u64,
    /// Computations currently in flight
    pub pending_count: usize,
    /// Reads served from the cache
    pub hits: u64,
    /// Reads that found nothing live
    pub misses: u64,
    /// Entries removed to respect the capacity bound
    pub evictions: u64,
    /// Entries removed because their TTL elapsed (lazily or by the sweep)
    pub expirations: u64,
    /// Entries removed by tag, prefix or tab invalidation
    pub invalidations: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn record_invalidations(&mut self, count: usize) {
        self.invalidations += count as u64;
    }
}
