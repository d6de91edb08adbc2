//! Built-in bundle builders.
//!
//! Each builder reads one domain through the shared cache, renders a short
//! markdown section and truncates it to the budget it was given. The
//! assembler never looks inside the text.

pub mod calendar;
pub mod contacts;
pub mod conversation;
pub mod grocery;
pub mod locations;
pub mod memory;
pub mod tasks;

use std::sync::Arc;

use steward_cache::{CacheOptions, DomainCache, PrefetchEntry, PrefetchReport};
use steward_config::AppConfig;
use steward_core::{BundleRegistry, BundleTier, ContextBundle, DataSources, Domain};

use crate::{global, token};

pub use calendar::CalendarBundle;
pub use contacts::ContactsBundle;
pub use conversation::ConversationBundle;
pub use grocery::GroceryBundle;
pub use locations::LocationsBundle;
pub use memory::MemoryBundle;
pub use tasks::TasksBundle;

/// Create a registry with every built-in bundle.
pub fn default_registry(
    cache: Arc<DomainCache>,
    sources: &DataSources,
    config: &AppConfig,
) -> BundleRegistry {
    let ttl = |domain: Domain| config.cache.ttl_for(domain);
    let limits = &config.assembler;

    let mut registry = BundleRegistry::new();
    registry.register(Box::new(TasksBundle::new(
        sources.tasks.clone(),
        cache.clone(),
        ttl(Domain::Tasks),
        limits.max_list_items,
    )));
    registry.register(Box::new(CalendarBundle::new(
        sources.calendar.clone(),
        cache.clone(),
        ttl(Domain::Calendar),
        limits.calendar_horizon_days,
    )));
    registry.register(Box::new(LocationsBundle::new(
        sources.places.clone(),
        cache.clone(),
        ttl(Domain::Locations),
    )));
    registry.register(Box::new(MemoryBundle::new(
        sources.memory.clone(),
        cache.clone(),
        ttl(Domain::Memory),
        limits.max_list_items,
    )));
    registry.register(Box::new(GroceryBundle::new(
        sources.grocery.clone(),
        cache.clone(),
        ttl(Domain::Grocery),
    )));
    registry.register(Box::new(ContactsBundle::new(
        sources.contacts.clone(),
        cache.clone(),
        ttl(Domain::Contacts),
        limits.max_list_items,
    )));
    registry.register(Box::new(ConversationBundle::new(
        sources.conversation.clone(),
        cache,
        ttl(Domain::Conversation),
        limits.conversation_window,
    )));
    registry
}

/// Warm the cache with the fixed-key source reads shared across routes.
///
/// Failures are reported, not returned; a cold key is simply computed again
/// on first use.
pub async fn warm_cache(
    cache: &DomainCache,
    sources: &DataSources,
    config: &AppConfig,
) -> PrefetchReport {
    let ttl = |domain: Domain| CacheOptions::tagged(config.cache.ttl_for(domain), domain);
    cache
        .prefetch(vec![
            PrefetchEntry::new(tasks::CACHE_KEY, ttl(Domain::Tasks), sources.tasks.open_tasks()),
            PrefetchEntry::new(grocery::CACHE_KEY, ttl(Domain::Grocery), sources.grocery.items()),
            PrefetchEntry::new(
                locations::CACHE_KEY,
                ttl(Domain::Locations),
                sources.places.saved_places(),
            ),
            PrefetchEntry::new(
                global::PROFILE_KEY,
                ttl(Domain::Profile),
                sources.profile.highlights(),
            ),
        ])
        .await
}

/// Truncate rendered content to `max_tokens` and wrap it in a bundle.
///
/// The tier is a placeholder; the assembler assigns the real one.
pub(crate) fn finish(name: &str, content: String, max_tokens: usize) -> ContextBundle {
    let content = token::truncate_to_tokens(&content, max_tokens);
    let tokens = token::estimate_tokens(&content);
    ContextBundle::new(name, BundleTier::Primary, content, tokens)
}
