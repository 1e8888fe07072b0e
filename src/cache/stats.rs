//! Handle Statistics Module
//!
//! Counts the events a cache handle produces. Aggregation across handles is
//! left to whoever composes them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Handle Stats ==
/// Lock-free event counters owned by one handle.
#[derive(Debug, Default)]
pub struct HandleStats {
    gets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    adds: AtomicU64,
    puts: AtomicU64,
    removes: AtomicU64,
    clears: AtomicU64,
    clear_regions: AtomicU64,
    expired: AtomicU64,
}

// == Stats Snapshot ==
/// Point-in-time copy of [`HandleStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Number of get calls
    pub gets: u64,
    /// Number of gets that returned a live item
    pub hits: u64,
    /// Number of gets that found nothing or an expired item
    pub misses: u64,
    /// Number of successful add calls
    pub adds: u64,
    /// Number of put calls
    pub puts: u64,
    /// Number of remove calls that actually removed something
    pub removes: u64,
    /// Number of clear calls
    pub clears: u64,
    /// Number of clear-region calls
    pub clear_regions: u64,
    /// Number of items removed lazily because they had expired
    pub expired: u64,
}

impl StatsSnapshot {
    // == Hit Rate ==
    /// Calculates the hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no gets have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl HandleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_add(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_clear_region(&self) {
        self.clear_regions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Reads every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            adds: self.adds.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            clear_regions: self.clear_regions.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}
