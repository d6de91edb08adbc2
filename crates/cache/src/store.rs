//! The domain cache itself.
//!
//! A single mutex guards the entry map, the domain index and the counters so
//! that every insert, eviction, invalidation and lazy expiry updates all
//! three together. The lock is never held across an `.await`.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use steward_core::Domain;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::stats::{CacheStats, Counters};

/// Type-erased cached value. Typed accessors downcast on the way out.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// Default capacity of a cache.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Shortest TTL an entry can be stored with; keeps `expires_at > created_at`.
pub const MIN_TTL: Duration = Duration::from_millis(1);

/// How long to keep a value and which domain to tag it under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Duration,
    pub domain: Option<Domain>,
}

impl CacheOptions {
    /// Untagged entry with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, domain: None }
    }

    /// Entry tagged under `domain`.
    pub fn tagged(ttl: Duration, domain: Domain) -> Self {
        Self {
            ttl,
            domain: Some(domain),
        }
    }
}

struct CacheEntry {
    value: CacheValue,
    created_at: Instant,
    expires_at: Instant,
    /// Insertion sequence; breaks `created_at` ties deterministically.
    seq: u64,
    hit_count: u64,
    domain: Option<Domain>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// domain → keys. The reverse direction lives on `CacheEntry::domain`.
    domains: HashMap<Domain, HashSet<String>>,
    counters: Counters,
    next_seq: u64,
}

impl CacheState {
    /// Remove an entry from storage and from the domain index.
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        if let Some(domain) = entry.domain {
            if let Some(keys) = self.domains.get_mut(&domain) {
                keys.remove(key);
                if keys.is_empty() {
                    self.domains.remove(&domain);
                }
            }
        }
        Some(entry)
    }

    fn oldest_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, e)| (e.created_at, e.seq))
            .map(|(k, _)| k.clone())
    }
}

/// Size-bounded, string-keyed cache with per-entry expiry and domain tags.
///
/// Constructed once at startup and shared as `Arc<DomainCache>` with the
/// assembler and every bundle builder.
///
/// Eviction is oldest-created-first: when the cache is full and a new key
/// arrives, the entry with the smallest `created_at` is dropped. Reads do
/// not refresh an entry's position.
///
/// Concurrent misses on the same key are not de-duplicated; each caller
/// computes and the last store wins.
pub struct DomainCache {
    max_entries: usize,
    state: Mutex<CacheState>,
}

impl DomainCache {
    /// Create a cache holding at most `max_entries` (minimum 1).
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Every mutation leaves the state consistent before it can panic,
        // so a poisoned lock still guards valid data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value, or compute, store and return it.
    ///
    /// Errors from `compute` propagate unchanged and nothing is stored.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        options: CacheOptions,
        compute: F,
    ) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(key) {
            return Ok(value);
        }
        let value = Arc::new(compute().await?);
        self.store(key.to_string(), value.clone(), options);
        Ok(value)
    }

    /// Fetch an unexpired value.
    ///
    /// An expired entry is removed (with its domain tag) and reported as a
    /// miss. A value stored under a different type is also a miss.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let now = Instant::now();
        let mut guard = self.lock();
        let state = &mut *guard;

        let expired = match state.entries.get(key) {
            None => {
                state.counters.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };
        if expired {
            state.remove(key);
            state.counters.misses += 1;
            debug!(key, "cache entry expired");
            return None;
        }

        let entry = state.entries.get_mut(key)?;
        match entry.value.clone().downcast::<T>() {
            Ok(value) => {
                entry.hit_count += 1;
                state.counters.hits += 1;
                Some(value)
            }
            Err(_) => {
                state.counters.misses += 1;
                warn!(key, "cached value has unexpected type");
                None
            }
        }
    }

    /// Store `value` unconditionally, replacing any existing entry.
    pub fn set<T: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: T,
        options: CacheOptions,
    ) {
        self.store(key.into(), Arc::new(value), options);
    }

    pub(crate) fn store(&self, key: String, value: CacheValue, options: CacheOptions) {
        let now = Instant::now();
        let ttl = options.ttl.max(MIN_TTL);
        let mut state = self.lock();

        if state.remove(&key).is_none() && state.entries.len() >= self.max_entries {
            if let Some(oldest) = state.oldest_key() {
                state.remove(&oldest);
                state.counters.evictions += 1;
                debug!(
                    evicted = %oldest,
                    incoming = %key,
                    "cache at capacity, evicted oldest entry"
                );
            }
        }

        if let Some(domain) = options.domain {
            state.domains.entry(domain).or_default().insert(key.clone());
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
                seq,
                hit_count: 0,
                domain: options.domain,
            },
        );
    }

    /// Remove every key tagged under `domain` and return how many were
    /// removed. `Domain::All` clears the whole cache and every tag set.
    pub fn invalidate_domain(&self, domain: Domain) -> usize {
        let mut state = self.lock();

        let removed = if domain == Domain::All {
            let count = state.entries.len();
            state.entries.clear();
            state.domains.clear();
            count
        } else {
            let keys = state.domains.remove(&domain).unwrap_or_default();
            keys.iter()
                .filter(|key| state.entries.remove(key.as_str()).is_some())
                .count()
        };

        state.counters.invalidations += removed as u64;
        if removed > 0 {
            info!(domain = %domain, removed, "invalidated cache domain");
        }
        removed
    }

    /// Remove a single key from storage and the domain index.
    pub fn invalidate_key(&self, key: &str) -> bool {
        let mut state = self.lock();
        let removed = state.remove(key).is_some();
        if removed {
            state.counters.invalidations += 1;
        }
        removed
    }

    /// Whether an unexpired entry exists. Does not touch counters.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Number of hits recorded against a live entry.
    pub fn hit_count(&self, key: &str) -> Option<u64> {
        self.lock().entries.get(key).map(|e| e.hit_count)
    }

    /// Keys currently tagged under `domain`, sorted.
    pub fn keys_in_domain(&self, domain: Domain) -> Vec<String> {
        let state = self.lock();
        let mut keys: Vec<String> = state
            .domains
            .get(&domain)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        expired.len()
    }

    pub(crate) fn record_prefetch(&self) {
        self.lock().counters.prefetches += 1;
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        state.counters.snapshot(state.entries.len())
    }

    pub fn reset_stats(&self) {
        self.lock().counters = Counters::default();
    }

    /// Remove all entries and tags. Counters are kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.domains.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DomainCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl std::fmt::Debug for DomainCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainCache")
            .field("max_entries", &self.max_entries)
            .field("size", &self.len())
            .finish()
    }
}
