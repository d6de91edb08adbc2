//! Concurrent warm-up of cache entries.
//!
//! A prefetch batch computes every missing entry concurrently. Each entry
//! succeeds or fails on its own: a failing compute is logged and reported,
//! and the remaining entries are still stored.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use serde::Serialize;
use tracing::{debug, warn};

use crate::store::{CacheOptions, CacheValue, DomainCache};

/// One key to warm, with the future that computes its value.
pub struct PrefetchEntry<'a> {
    key: String,
    options: CacheOptions,
    compute: BoxFuture<'a, Result<CacheValue, String>>,
}

impl<'a> PrefetchEntry<'a> {
    pub fn new<T, E, Fut>(key: impl Into<String>, options: CacheOptions, compute: Fut) -> Self
    where
        T: Any + Send + Sync,
        E: Display,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        Self {
            key: key.into(),
            options,
            compute: Box::pin(async move {
                compute
                    .await
                    .map(|value| Arc::new(value) as CacheValue)
                    .map_err(|e| e.to_string())
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A prefetch entry whose compute failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefetchFailure {
    pub key: String,
    pub reason: String,
}

/// Outcome of a prefetch batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    /// Keys computed and stored by this batch.
    pub computed: Vec<String>,
    /// Keys that were already cached and left untouched.
    pub skipped: Vec<String>,
    pub failed: Vec<PrefetchFailure>,
}

impl PrefetchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl DomainCache {
    /// Compute and store every entry not already cached.
    ///
    /// Entries run concurrently; the batch waits for all of them. A failed
    /// entry never prevents the others from being stored.
    pub async fn prefetch(&self, entries: Vec<PrefetchEntry<'_>>) -> PrefetchReport {
        let mut report = PrefetchReport::default();
        let mut pending = Vec::with_capacity(entries.len());
        for entry in entries {
            if self.contains(&entry.key) {
                report.skipped.push(entry.key);
            } else {
                pending.push(entry);
            }
        }

        let outcomes = join_all(pending.into_iter().map(|entry| async move {
            let PrefetchEntry {
                key,
                options,
                compute,
            } = entry;
            match compute.await {
                Ok(value) => {
                    self.store(key.clone(), value, options);
                    self.record_prefetch();
                    Ok(key)
                }
                Err(reason) => Err(PrefetchFailure { key, reason }),
            }
        }))
        .await;

        for outcome in outcomes {
            match outcome {
                Ok(key) => report.computed.push(key),
                Err(failure) => {
                    warn!(key = %failure.key, error = %failure.reason, "prefetch compute failed");
                    report.failed.push(failure);
                }
            }
        }

        debug!(
            computed = report.computed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "prefetch batch finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use steward_core::Domain;

    fn options(domain: Domain) -> CacheOptions {
        CacheOptions::tagged(Duration::from_secs(60), domain)
    }

    #[tokio::test]
    async fn prefetch_stores_all_successful_entries() {
        let cache = DomainCache::default();
        let report = cache
            .prefetch(vec![
                PrefetchEntry::new("tasks:open", options(Domain::Tasks), async {
                    Ok::<_, String>(vec!["file taxes".to_string()])
                }),
                PrefetchEntry::new("profile", options(Domain::Profile), async {
                    Ok::<_, String>("night owl".to_string())
                }),
            ])
            .await;

        assert_eq!(report.computed, vec!["tasks:open", "profile"]);
        assert!(report.is_complete());
        assert_eq!(cache.stats().prefetches, 2);
        assert_eq!(
            cache.get::<String>("profile").as_deref().map(String::as_str),
            Some("night owl")
        );
        assert_eq!(cache.keys_in_domain(Domain::Tasks), vec!["tasks:open"]);
    }

    #[tokio::test]
    async fn one_failure_does_not_block_others() {
        let cache = DomainCache::default();
        let report = cache
            .prefetch(vec![
                PrefetchEntry::new("calendar:week", options(Domain::Calendar), async {
                    Err::<u32, _>("calendar API timed out")
                }),
                PrefetchEntry::new("grocery:list", options(Domain::Grocery), async {
                    Ok::<_, String>(3u32)
                }),
            ])
            .await;

        assert_eq!(report.computed, vec!["grocery:list"]);
        assert_eq!(
            report.failed,
            vec![PrefetchFailure {
                key: "calendar:week".into(),
                reason: "calendar API timed out".into(),
            }]
        );
        assert!(cache.contains("grocery:list"));
        assert!(!cache.contains("calendar:week"));
    }

    #[tokio::test]
    async fn already_cached_keys_are_skipped() {
        let cache = DomainCache::default();
        cache.set("memory:recent", 1u32, options(Domain::Memory));

        let report = cache
            .prefetch(vec![PrefetchEntry::new(
                "memory:recent",
                options(Domain::Memory),
                async { Ok::<_, String>(99u32) },
            )])
            .await;

        assert_eq!(report.skipped, vec!["memory:recent"]);
        assert!(report.computed.is_empty());
        assert_eq!(cache.get::<u32>("memory:recent").map(|v| *v), Some(1));
        assert_eq!(cache.stats().prefetches, 0);
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let cache = DomainCache::default();
        let report = cache.prefetch(Vec::new()).await;
        assert_eq!(report, PrefetchReport::default());
    }
}
