//! Key contacts bundle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use steward_cache::{CacheOptions, DomainCache};
use steward_core::{
    AppContext, BundleBuilder, BundleError, BundleTier, ContactSource, ContextBundle, Domain,
    bundle_names,
};

use crate::bundles::finish;

pub struct ContactsBundle {
    source: Arc<dyn ContactSource>,
    cache: Arc<DomainCache>,
    ttl: Duration,
    limit: usize,
}

impl ContactsBundle {
    pub fn new(
        source: Arc<dyn ContactSource>,
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
impl BundleBuilder for ContactsBundle {
    fn name(&self) -> &str {
        bundle_names::CONTACTS
    }
    async fn build(
        &self,
        _ctx: &AppContext,
        max_tokens: usize,
    ) -> Result<ContextBundle, BundleError> {
        let key = format!("contacts:key:{}", self.limit);
        let contacts = self
            .cache
            .get_or_compute(&key, CacheOptions::tagged(self.ttl, Domain::Contacts), || {
                self.source.key_contacts(self.limit)
            })
            .await?;

        if contacts.is_empty() {
            return Ok(ContextBundle::empty(self.name(), BundleTier::Primary));
        }

        let mut out = String::from("## Key Contacts");
        for contact in contacts.iter() {
            out.push_str(&format!("\n- {}", contact.name));
            if let Some(relationship) = &contact.relationship {
                out.push_str(&format!(" ({relationship})"));
            }
            if let Some(notes) = &contact.notes {
                out.push_str(&format!(": {notes}"));
            }
        }
        Ok(finish(self.name(), out, max_tokens))
    }
}
