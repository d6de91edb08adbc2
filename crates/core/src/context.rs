//! Per-request application context.
//!
//! An `AppContext` is built once for each inbound user turn and handed to
//! the assembler and every bundle builder. It is never mutated after
//! construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sources::SignificantPlace;

/// The reserved route used when a caller's route is unknown.
pub const DEFAULT_ROUTE: &str = "sms";

/// A reference to a named entity (person, place, project) mentioned in
/// conversation or supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Everything the router needs to know about the current turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppContext {
    /// Calling context: an app screen path (`/tasks`) or `sms`.
    pub route: String,

    /// The user's message for this turn.
    pub user_message: String,

    /// Present when the turn belongs to an ongoing conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(default)]
    pub is_admin: bool,

    /// IANA timezone name (e.g. `America/New_York`).
    pub timezone: String,

    /// Wall-clock time of the request.
    pub now: DateTime<Utc>,

    /// Entities the caller already knows are relevant to this turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_entities: Vec<EntityRef>,

    /// Significant place the user is at for this turn. The assembler fills
    /// this from the promotion signal so every bundle sees one answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significant_place: Option<SignificantPlace>,
}

impl AppContext {
    /// Create a context for `route` at the current time in UTC.
    pub fn new(route: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            user_message: user_message.into(),
            conversation_id: None,
            is_admin: false,
            timezone: "UTC".into(),
            now: Utc::now(),
            mentioned_entities: Vec::new(),
            significant_place: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Pin the request time (useful for deterministic rendering).
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_entities(mut self, entities: Vec<EntityRef>) -> Self {
        self.mentioned_entities = entities;
        self
    }

    pub fn with_significant_place(mut self, place: Option<SignificantPlace>) -> Self {
        self.significant_place = place;
        self
    }
}
