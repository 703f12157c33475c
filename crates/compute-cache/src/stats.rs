//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Snapshot of compute cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests served from a settled entry.
    pub hits: u64,
    /// Requests that started a fresh computation.
    pub misses: u64,
    /// Requests that joined an in-flight computation.
    pub joins: u64,
    pub evictions: u64,
    /// Computations that settled as cancelled.
    pub cancellations: u64,
    /// Computations that settled with a failure.
    pub failures: u64,
    pub entries: usize,
    pub pending: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of requests answered without computing (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.joins + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.joins) as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub joins: AtomicU64,
    pub evictions: AtomicU64,
    pub cancellations: AtomicU64,
    pub failures: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize, pending: usize, capacity: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            entries,
            pending,
            capacity,
        }
    }
}
