//! On-demand cross-domain bundle.
//!
//! For entities the conversation keeps coming back to (people, places,
//! projects), summarize what every other domain knows about them in one
//! line each.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use steward_core::{
    AppContext, BundleTier, ContextBundle, Domain, EntityRef, EntityResolver, RelatedItem,
    bundle_names,
};
use tracing::{debug, warn};

use crate::token;

pub const DEFAULT_WINDOW: usize = 10;
pub const DEFAULT_MAX_ENTITIES: usize = 10;
pub const DEFAULT_MAX_TOKENS: usize = 800;

pub struct CrossDomainBuilder {
    resolver: Arc<dyn EntityResolver>,
    window: usize,
    max_entities: usize,
    max_tokens: usize,
}

impl CrossDomainBuilder {
    pub fn new(resolver: Arc<dyn EntityResolver>) -> Self {
        Self {
            resolver,
            window: DEFAULT_WINDOW,
            max_entities: DEFAULT_MAX_ENTITIES,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_limits(mut self, window: usize, max_entities: usize, max_tokens: usize) -> Self {
        self.window = window;
        self.max_entities = max_entities;
        self.max_tokens = max_tokens;
        self
    }

    /// Build the bundle for a conversation turn.
    ///
    /// Returns `None` outside a conversation, when listing entities fails,
    /// or when no entity has related items.
    pub async fn build(&self, ctx: &AppContext) -> Option<ContextBundle> {
        let conversation_id = ctx.conversation_id.as_deref()?;

        let from_conversation = match self
            .resolver
            .entities_in_conversation(conversation_id, self.window)
            .await
        {
            Ok(entities) => entities,
            Err(e) => {
                warn!(
                    error = %e,
                    conversation_id,
                    "entity lookup failed, omitting cross-domain bundle"
                );
                return None;
            }
        };

        let entities = dedupe(from_conversation, &ctx.mentioned_entities, self.max_entities);
        if entities.is_empty() {
            return None;
        }

        let lookups = entities.iter().map(|entity| async move {
            match self.resolver.related_items(&entity.id).await {
                Ok(items) => summarize(entity, &items),
                Err(e) => {
                    warn!(error = %e, entity = %entity.id, "related items lookup failed");
                    None
                }
            }
        });
        let lines: Vec<String> = join_all(lookups).await.into_iter().flatten().collect();
        if lines.is_empty() {
            return None;
        }
        debug!(entities = entities.len(), lines = lines.len(), "built cross-domain bundle");

        let content = token::truncate_to_tokens(&lines.join("\n"), self.max_tokens);
        let tokens = token::estimate_tokens(&content);
        Some(ContextBundle::new(
            bundle_names::CROSS_DOMAIN,
            BundleTier::CrossDomain,
            content,
            tokens,
        ))
    }
}

/// Conversation entities first, then caller-supplied ones; first id wins.
fn dedupe(conversation: Vec<EntityRef>, mentioned: &[EntityRef], cap: usize) -> Vec<EntityRef> {
    let mut seen = HashSet::new();
    conversation
        .into_iter()
        .chain(mentioned.iter().cloned())
        .filter(|e| seen.insert(e.id.clone()))
        .take(cap)
        .collect()
}

/// `About <name>: <domain>: a, b; <domain>: c.`, domains in first-seen order.
fn summarize(entity: &EntityRef, items: &[RelatedItem]) -> Option<String> {
    let mut groups: Vec<(Domain, Vec<&str>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(d, _)| *d == item.domain) {
            Some((_, summaries)) => summaries.push(item.summary.as_str()),
            None => groups.push((item.domain, vec![item.summary.as_str()])),
        }
    }
    if groups.is_empty() {
        return None;
    }
    let parts: Vec<String> = groups
        .iter()
        .map(|(domain, summaries)| format!("{domain}: {}", summaries.join(", ")))
        .collect();
    Some(format!("About {}: {}.", entity.name, parts.join("; ")))
}
