//! Data source traits — read-only views over application state.
//!
//! Persistence is external to the router. Bundle builders, the
//! significant-place detector and the cross-domain resolver all read through
//! these traits, which lets tests swap in fixtures and production wire in a
//! database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::EntityRef;
use crate::domain::Domain;
use crate::error::SourceError;

// ── Records ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceCategory {
    Home,
    Work,
    Frequent,
    #[default]
    Other,
}

impl PlaceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceCategory::Home => "home",
            PlaceCategory::Work => "work",
            PlaceCategory::Frequent => "frequent",
            PlaceCategory::Other => "other",
        }
    }
}

/// A saved place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: PlaceCategory,
    pub latitude: f64,
    pub longitude: f64,
    /// Geofence radius for starred places.
    #[serde(default = "default_radius")]
    pub radius_meters: f64,
    #[serde(default)]
    pub starred: bool,
}

fn default_radius() -> f64 {
    100.0
}

/// The most recent location fix reported by the user's device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A place the user is currently at that should influence context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantPlace {
    pub name: String,
    pub category: PlaceCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNote {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    /// Entities extracted from this message by the NLP pipeline.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityRef>,
}

/// A short fact about the user surfaced in every context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileHighlight {
    pub label: String,
    pub value: String,
}

/// An item in some domain that relates to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedItem {
    pub domain: Domain,
    pub summary: String,
}

// ── Traits ────────────────────────────────────────────────────────────────

#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Tasks that are not completed.
    async fn open_tasks(&self) -> Result<Vec<Task>, SourceError>;
}

#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Events starting within `[from, to)`, ordered by start time.
    async fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, SourceError>;
}

#[async_trait]
pub trait PlaceSource: Send + Sync {
    async fn saved_places(&self) -> Result<Vec<Place>, SourceError>;
    async fn latest_coordinates(&self) -> Result<Option<Coordinates>, SourceError>;
}

#[async_trait]
pub trait MemorySource: Send + Sync {
    /// Most recent notes first.
    async fn recent_notes(&self, limit: usize) -> Result<Vec<MemoryNote>, SourceError>;
}

#[async_trait]
pub trait GrocerySource: Send + Sync {
    async fn items(&self) -> Result<Vec<GroceryItem>, SourceError>;
}

#[async_trait]
pub trait ContactSource: Send + Sync {
    async fn key_contacts(&self, limit: usize) -> Result<Vec<Contact>, SourceError>;
}

#[async_trait]
pub trait ConversationSource: Send + Sync {
    /// The last `limit` messages of a conversation, oldest first.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, SourceError>;
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn highlights(&self) -> Result<Vec<ProfileHighlight>, SourceError>;
}

/// Real-time signal used for tier promotion.
#[async_trait]
pub trait SignificantPlaceDetector: Send + Sync {
    /// The significant place the user is currently at, if any.
    async fn current_place(&self) -> Result<Option<SignificantPlace>, SourceError>;
}

/// Resolves entities and their cross-domain relations.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// Entities referenced in the last `last_n` messages, in mention order.
    async fn entities_in_conversation(
        &self,
        conversation_id: &str,
        last_n: usize,
    ) -> Result<Vec<EntityRef>, SourceError>;

    /// Items in any domain related to the entity.
    async fn related_items(&self, entity_id: &str) -> Result<Vec<RelatedItem>, SourceError>;
}

/// Handles to every data source, shared by the reference bundle builders.
#[derive(Clone)]
pub struct DataSources {
    pub tasks: Arc<dyn TaskSource>,
    pub calendar: Arc<dyn CalendarSource>,
    pub places: Arc<dyn PlaceSource>,
    pub memory: Arc<dyn MemorySource>,
    pub grocery: Arc<dyn GrocerySource>,
    pub contacts: Arc<dyn ContactSource>,
    pub conversation: Arc<dyn ConversationSource>,
    pub profile: Arc<dyn ProfileSource>,
}

impl DataSources {
    /// Use one object that implements every source trait for all of them.
    pub fn from_single<S>(source: Arc<S>) -> Self
    where
        S: TaskSource
            + CalendarSource
            + PlaceSource
            + MemorySource
            + GrocerySource
            + ContactSource
            + ConversationSource
            + ProfileSource
            + 'static,
    {
        Self {
            tasks: source.clone(),
            calendar: source.clone(),
            places: source.clone(),
            memory: source.clone(),
            grocery: source.clone(),
            contacts: source.clone(),
            conversation: source.clone(),
            profile: source,
        }
    }
}
