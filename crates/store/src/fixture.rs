//! JSON fixtures — a snapshot of every domain, used to seed an
//! [`InMemoryStore`](crate::InMemoryStore) for demos and tests.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use steward_core::{
    CalendarEvent, Contact, ConversationMessage, Coordinates, GroceryItem, MemoryNote, Place,
    ProfileHighlight, RelatedItem, Result, SourceError, Task,
};
use tracing::debug;

/// Every domain's data in one document. All sections are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub tasks: Vec<Task>,
    pub events: Vec<CalendarEvent>,
    pub places: Vec<Place>,
    /// Latest location fix.
    pub coordinates: Option<Coordinates>,
    pub notes: Vec<MemoryNote>,
    pub grocery: Vec<GroceryItem>,
    pub contacts: Vec<Contact>,
    /// Conversation id → messages, oldest first.
    pub conversations: HashMap<String, Vec<ConversationMessage>>,
    pub profile: Vec<ProfileHighlight>,
    /// Entity id → explicitly linked items.
    pub related: HashMap<String, Vec<RelatedItem>>,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a fixture file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SourceError::query(format!("fixture {}", path.display()), e.to_string()))?;
        let fixture = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            tasks = fixture.tasks.len(),
            events = fixture.events.len(),
            places = fixture.places.len(),
            "fixture loaded"
        );
        Ok(fixture)
    }
}
