//! Cache domains — tags grouping cached keys for bulk invalidation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A group of cached keys that are invalidated together when the
/// underlying data changes.
///
/// `All` is reserved: invalidating it clears the entire cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Tasks,
    Calendar,
    Memory,
    Grocery,
    Contacts,
    Locations,
    Profile,
    Conversation,
    All,
}

impl Domain {
    /// Every concrete domain (excludes `All`).
    pub const CONCRETE: [Domain; 8] = [
        Domain::Tasks,
        Domain::Calendar,
        Domain::Memory,
        Domain::Grocery,
        Domain::Contacts,
        Domain::Locations,
        Domain::Profile,
        Domain::Conversation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Tasks => "tasks",
            Domain::Calendar => "calendar",
            Domain::Memory => "memory",
            Domain::Grocery => "grocery",
            Domain::Contacts => "contacts",
            Domain::Locations => "locations",
            Domain::Profile => "profile",
            Domain::Conversation => "conversation",
            Domain::All => "all",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tasks" => Ok(Domain::Tasks),
            "calendar" => Ok(Domain::Calendar),
            "memory" => Ok(Domain::Memory),
            "grocery" => Ok(Domain::Grocery),
            "contacts" => Ok(Domain::Contacts),
            "locations" => Ok(Domain::Locations),
            "profile" => Ok(Domain::Profile),
            "conversation" => Ok(Domain::Conversation),
            "all" => Ok(Domain::All),
            other => Err(format!("unknown cache domain: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Tasks".parse::<Domain>().unwrap(), Domain::Tasks);
        assert_eq!("ALL".parse::<Domain>().unwrap(), Domain::All);
        assert!("weather".parse::<Domain>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Domain::Locations).unwrap();
        assert_eq!(json, "\"locations\"");
    }

    #[test]
    fn concrete_excludes_all() {
        assert!(!Domain::CONCRETE.contains(&Domain::All));
    }
}
