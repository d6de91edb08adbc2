//! TTL domain cache for Steward.
//!
//! Caches expensive per-turn data fetches (open tasks, this week's events,
//! profile highlights, ...) for a short time, bounded in size, with bulk
//! invalidation by domain tag.
//!
//! ```text
//!                    DomainCache
//!                         |
//!        +----------------+----------------+
//!        |                |                |
//!        v                v                v
//!    entries         domain index        counters
//!  (key → value,    (domain → keys,     (hits, misses,
//!   expiry, hits)    key → domain)       evictions, ...)
//! ```
//!
//! Write paths keep the cache fresh by calling
//! [`DomainCache::invalidate_domain`] right after a successful write.

pub mod prefetch;
pub mod stats;
pub mod store;

pub use prefetch::{PrefetchEntry, PrefetchFailure, PrefetchReport};
pub use stats::CacheStats;
pub use store::{CacheOptions, CacheValue, DEFAULT_MAX_ENTRIES, DomainCache, MIN_TTL};
