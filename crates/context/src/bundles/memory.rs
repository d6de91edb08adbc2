//! Memories bundle — the user's most recent notes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use steward_cache::{CacheOptions, DomainCache};
use steward_core::{
    AppContext, BundleBuilder, BundleError, ContextBundle, Domain, MemorySource, bundle_names,
};

use crate::bundles::finish;
use crate::clock;

pub struct MemoryBundle {
    source: Arc<dyn MemorySource>,
    cache: Arc<DomainCache>,
    ttl: Duration,
    limit: usize,
}

impl MemoryBundle {
    pub fn new(
        source: Arc<dyn MemorySource>,
        cache: Arc<DomainCache>,
        ttl: Duration,
        limit: usize,
    ) -> Self {
        Self {
            source,
            cache,
            ttl,
            limit,
        }
    }
}

#[async_trait]
impl BundleBuilder for MemoryBundle {
    fn name(&self) -> &str {
        bundle_names::MEMORY
    }
    async fn build(
        &self,
        ctx: &AppContext,
        max_tokens: usize,
    ) -> Result<ContextBundle, BundleError> {
        let key = format!("memory:recent:{}", self.limit);
        let notes = self
            .cache
            .get_or_compute(&key, CacheOptions::tagged(self.ttl, Domain::Memory), || {
                self.source.recent_notes(self.limit)
            })
            .await?;

        if notes.is_empty() {
            return Ok(ContextBundle::empty(self.name(), steward_core::BundleTier::Primary));
        }

        let tz = clock::user_timezone(ctx);
        let mut out = String::from("## Memories");
        for note in notes.iter() {
            out.push_str(&format!(
                "\n- {} ({})",
                note.content,
                note.created_at.with_timezone(&tz).format("%b %-d")
            ));
        }
        Ok(finish(self.name(), out, max_tokens))
    }
}
