//! Recent conversation bundle. Empty for turns outside a conversation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use steward_cache::{CacheOptions, DomainCache};
use steward_core::{
    AppContext, BundleBuilder, BundleError, BundleTier, ContextBundle, ConversationSource, Domain,
    MessageRole, bundle_names,
};

use crate::bundles::finish;

pub struct ConversationBundle {
    source: Arc<dyn ConversationSource>,
    cache: Arc<DomainCache>,
    ttl: Duration,
    window: usize,
}

impl ConversationBundle {
    pub fn new(
        source: Arc<dyn ConversationSource>,
        cache: Arc<DomainCache>,
        ttl: Duration,
        window: usize,
    ) -> Self {
        Self {
            source,
            cache,
            ttl,
            window,
        }
    }
}

#[async_trait]
impl BundleBuilder for ConversationBundle {
    fn name(&self) -> &str {
        bundle_names::CONVERSATION
    }
    async fn build(
        &self,
        ctx: &AppContext,
        max_tokens: usize,
    ) -> Result<ContextBundle, BundleError> {
        let Some(conversation_id) = ctx.conversation_id.as_deref() else {
            return Ok(ContextBundle::empty(self.name(), BundleTier::Primary));
        };

        let key = format!("conversation:{conversation_id}:{}", self.window);
        let messages = self
            .cache
            .get_or_compute(&key, CacheOptions::tagged(self.ttl, Domain::Conversation), || {
                self.source.recent_messages(conversation_id, self.window)
            })
            .await?;

        if messages.is_empty() {
            return Ok(ContextBundle::empty(self.name(), BundleTier::Primary));
        }

        let mut out = String::from("## Recent Conversation");
        for message in messages.iter() {
            let speaker = match message.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            out.push_str(&format!("\n{speaker}: {}", message.content));
        }
        Ok(finish(self.name(), out, max_tokens))
    }
}
