//! Cache Statistics Module
//!
//! Read counters kept by the handle, combined with the LRU eviction count
//! and the live entry count when a snapshot is taken.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Successful reads
    pub hits: u64,
    /// Reads of absent or expired keys
    pub misses: u64,
    /// Keys dropped by the LRU bound
    pub evictions: u64,
    /// Entries in the store, excluding the expiry index record
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// hits / (hits + misses), or 0.0 before any read.
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

    /// Copies the read counters and fills in the values owned elsewhere.
    pub fn snapshot(&self, evictions: u64, total_entries: usize) -> Self {
        Self {
            evictions,
            total_entries,
            ..self.clone()
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats, CacheStats::default());
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_snapshot_keeps_counters() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();

        let snap = stats.snapshot(4, 10);
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.evictions, 4);
        assert_eq!(snap.total_entries, 10);
    }
}
