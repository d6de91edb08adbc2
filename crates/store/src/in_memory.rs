//! In-memory store — backs every data source for tests, demos and the CLI.
//!
//! Every mutator invalidates its cache domain after the write succeeds, so
//! bundles built through an attached [`DomainCache`] never serve data older
//! than the last write.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use steward_cache::DomainCache;
use steward_core::{
    CalendarEvent, CalendarSource, Contact, ContactSource, ConversationMessage,
    ConversationSource, Coordinates, Domain, EntityRef, EntityResolver, GroceryItem,
    GrocerySource, MemoryNote, MemorySource, Place, PlaceSource, ProfileHighlight, ProfileSource,
    RelatedItem, SourceError, Task, TaskSource,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::fixture::Fixture;

/// All domains held in one [`Fixture`] behind an async lock.
pub struct InMemoryStore {
    data: Arc<RwLock<Fixture>>,
    cache: Option<Arc<DomainCache>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::from_fixture(Fixture::default())
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        Self {
            data: Arc::new(RwLock::new(fixture)),
            cache: None,
        }
    }

    /// Invalidate `cache` on every write.
    pub fn with_cache(mut self, cache: Arc<DomainCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn invalidate(&self, domain: Domain) {
        if let Some(cache) = &self.cache {
            let removed = cache.invalidate_domain(domain);
            debug!(%domain, removed, "store write invalidated cache");
        }
    }

    /// A snapshot of everything in the store.
    pub async fn snapshot(&self) -> Fixture {
        self.data.read().await.clone()
    }

    // ── Tasks ─────────────────────────────────────────────────────────────

    pub async fn add_task(
        &self,
        title: impl Into<String>,
        due_at: Option<DateTime<Utc>>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.data.write().await.tasks.push(Task {
            id: id.clone(),
            title: title.into(),
            due_at,
            completed: false,
        });
        self.invalidate(Domain::Tasks);
        id
    }

    /// Mark a task done. Returns false if no such task exists.
    pub async fn complete_task(&self, id: &str) -> bool {
        let found = {
            let mut data = self.data.write().await;
            match data.tasks.iter_mut().find(|t| t.id == id) {
                Some(task) => {
                    task.completed = true;
                    true
                }
                None => false,
            }
        };
        if found {
            self.invalidate(Domain::Tasks);
        }
        found
    }

    // ── Calendar ──────────────────────────────────────────────────────────

    pub async fn add_event(&self, event: CalendarEvent) {
        self.data.write().await.events.push(event);
        self.invalidate(Domain::Calendar);
    }

    // ── Places ────────────────────────────────────────────────────────────

    pub async fn add_place(&self, place: Place) {
        self.data.write().await.places.push(place);
        self.invalidate(Domain::Locations);
    }

    pub async fn record_coordinates(&self, coordinates: Coordinates) {
        self.data.write().await.coordinates = Some(coordinates);
        self.invalidate(Domain::Locations);
    }

    // ── Memory ────────────────────────────────────────────────────────────

    pub async fn add_note(&self, content: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.data.write().await.notes.push(MemoryNote {
            id: id.clone(),
            content: content.into(),
            created_at: Utc::now(),
        });
        self.invalidate(Domain::Memory);
        id
    }

    // ── Grocery ───────────────────────────────────────────────────────────

    pub async fn add_grocery_item(
        &self,
        name: impl Into<String>,
        quantity: Option<String>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.data.write().await.grocery.push(GroceryItem {
            id: id.clone(),
            name: name.into(),
            quantity,
            checked: false,
        });
        self.invalidate(Domain::Grocery);
        id
    }

    /// Tick an item off the list. Returns false if no such item exists.
    pub async fn check_grocery_item(&self, id: &str) -> bool {
        let found = {
            let mut data = self.data.write().await;
            match data.grocery.iter_mut().find(|i| i.id == id) {
                Some(item) => {
                    item.checked = true;
                    true
                }
                None => false,
            }
        };
        if found {
            self.invalidate(Domain::Grocery);
        }
        found
    }

    // ── Contacts ──────────────────────────────────────────────────────────

    pub async fn add_contact(&self, contact: Contact) {
        self.data.write().await.contacts.push(contact);
        self.invalidate(Domain::Contacts);
    }

    // ── Conversation ──────────────────────────────────────────────────────

    pub async fn append_message(&self, conversation_id: &str, message: ConversationMessage) {
        self.data
            .write()
            .await
            .conversations
            .entry(conversation_id.to_string())
            .or_default()
            .push(message);
        self.invalidate(Domain::Conversation);
    }

    // ── Profile ───────────────────────────────────────────────────────────

    pub async fn set_profile(&self, highlights: Vec<ProfileHighlight>) {
        self.data.write().await.profile = highlights;
        self.invalidate(Domain::Profile);
    }

    /// Link an item in some domain to an entity.
    pub async fn relate(&self, entity_id: &str, item: RelatedItem) {
        let domain = item.domain;
        self.data
            .write()
            .await
            .related
            .entry(entity_id.to_string())
            .or_default()
            .push(item);
        self.invalidate(domain);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Sources ───────────────────────────────────────────────────────────────

#[async_trait]
impl TaskSource for InMemoryStore {
    async fn open_tasks(&self) -> Result<Vec<Task>, SourceError> {
        let data = self.data.read().await;
        Ok(data.tasks.iter().filter(|t| !t.completed).cloned().collect())
    }
}

#[async_trait]
impl CalendarSource for InMemoryStore {
    async fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, SourceError> {
        let data = self.data.read().await;
        let mut events: Vec<CalendarEvent> = data
            .events
            .iter()
            .filter(|e| e.starts_at >= from && e.starts_at < to)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events)
    }
}

#[async_trait]
impl PlaceSource for InMemoryStore {
    async fn saved_places(&self) -> Result<Vec<Place>, SourceError> {
        Ok(self.data.read().await.places.clone())
    }

    async fn latest_coordinates(&self) -> Result<Option<Coordinates>, SourceError> {
        Ok(self.data.read().await.coordinates)
    }
}

#[async_trait]
impl MemorySource for InMemoryStore {
    async fn recent_notes(&self, limit: usize) -> Result<Vec<MemoryNote>, SourceError> {
        let data = self.data.read().await;
        let mut notes = data.notes.clone();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notes.truncate(limit);
        Ok(notes)
    }
}

#[async_trait]
impl GrocerySource for InMemoryStore {
    async fn items(&self) -> Result<Vec<GroceryItem>, SourceError> {
        Ok(self.data.read().await.grocery.clone())
    }
}

#[async_trait]
impl ContactSource for InMemoryStore {
    async fn key_contacts(&self, limit: usize) -> Result<Vec<Contact>, SourceError> {
        let data = self.data.read().await;
        Ok(data.contacts.iter().take(limit).cloned().collect())
    }
}

#[async_trait]
impl ConversationSource for InMemoryStore {
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, SourceError> {
        let data = self.data.read().await;
        let Some(messages) = data.conversations.get(conversation_id) else {
            return Ok(Vec::new());
        };
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }
}

#[async_trait]
impl ProfileSource for InMemoryStore {
    async fn highlights(&self) -> Result<Vec<ProfileHighlight>, SourceError> {
        Ok(self.data.read().await.profile.clone())
    }
}

// ── Entity resolution ─────────────────────────────────────────────────────

#[async_trait]
impl EntityResolver for InMemoryStore {
    async fn entities_in_conversation(
        &self,
        conversation_id: &str,
        last_n: usize,
    ) -> Result<Vec<EntityRef>, SourceError> {
        let messages = self.recent_messages(conversation_id, last_n).await?;
        Ok(messages.into_iter().flat_map(|m| m.entities).collect())
    }

    /// Explicit links first, then open tasks, upcoming events, notes and
    /// unchecked grocery items that mention the entity by name.
    async fn related_items(&self, entity_id: &str) -> Result<Vec<RelatedItem>, SourceError> {
        let data = self.data.read().await;
        let mut items = data.related.get(entity_id).cloned().unwrap_or_default();

        let Some(name) = entity_name(&data, entity_id) else {
            return Ok(items);
        };
        let needle = name.to_lowercase();
        let mentions = |text: &str| text.to_lowercase().contains(&needle);
        let now = Utc::now();

        let derived = data
            .tasks
            .iter()
            .filter(|t| !t.completed && mentions(&t.title))
            .map(|t| (Domain::Tasks, t.title.clone()))
            .chain(
                data.events
                    .iter()
                    .filter(|e| e.starts_at >= now && mentions(&e.title))
                    .map(|e| (Domain::Calendar, e.title.clone())),
            )
            .chain(
                data.notes
                    .iter()
                    .filter(|n| mentions(&n.content))
                    .map(|n| (Domain::Memory, n.content.clone())),
            )
            .chain(
                data.grocery
                    .iter()
                    .filter(|g| !g.checked && mentions(&g.name))
                    .map(|g| (Domain::Grocery, g.name.clone())),
            );
        for (domain, summary) in derived {
            if !items.iter().any(|i| i.domain == domain && i.summary == summary) {
                items.push(RelatedItem { domain, summary });
            }
        }
        Ok(items)
    }
}

/// Name of an entity as seen in any conversation, contact or place.
fn entity_name(data: &Fixture, entity_id: &str) -> Option<String> {
    data.conversations
        .values()
        .flatten()
        .flat_map(|m| m.entities.iter())
        .find(|e| e.id == entity_id)
        .map(|e| e.name.clone())
        .or_else(|| {
            data.contacts
                .iter()
                .find(|c| c.id == entity_id)
                .map(|c| c.name.clone())
        })
        .or_else(|| data.places.iter().find(|p| p.id == entity_id).map(|p| p.name.clone()))
}
