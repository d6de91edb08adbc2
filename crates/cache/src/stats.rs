//! Cache counters and the public stats snapshot.

use serde::{Deserialize, Serialize};

/// Running counters, owned by the cache state.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub prefetches: u64,
}

impl Counters {
    pub fn snapshot(&self, size: usize) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            invalidations: self.invalidations,
            prefetches: self.prefetches,
            size,
            hit_rate: hit_rate(self.hits, self.misses),
        }
    }
}

/// Point-in-time view of cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed to make room for a new key.
    pub evictions: u64,
    /// Entries removed by domain or key invalidation.
    pub invalidations: u64,
    /// Entries computed and stored by prefetch batches.
    pub prefetches: u64,
    pub size: usize,
    /// `hits / (hits + misses)`, or `0.0` before any access.
    pub hit_rate: f64,
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
