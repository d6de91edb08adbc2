//! # Steward Core
//!
//! Domain types, traits, and error definitions for the Steward context
//! router. This crate has **no framework dependencies**: it defines the domain
//! model that the cache, assembler and data stores implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the router talks to is defined as a trait here
//! (bundle builders, data sources, the significant-place detector, the
//! entity resolver). Implementations live in their respective crates. This
//! enables:
//! - Swapping a database-backed store for fixtures in tests
//! - Registering additional bundles without touching the assembler
//! - Clean dependency graph (all crates depend inward on core)

pub mod bundle;
pub mod context;
pub mod domain;
pub mod error;
pub mod routing;
pub mod sources;

// Re-export key types at crate root for ergonomics
pub use bundle::{BundleBuilder, BundleRegistry, BundleTier, ContextBundle};
pub use context::{AppContext, DEFAULT_ROUTE, EntityRef};
pub use domain::Domain;
pub use error::{BundleError, Error, Result, SourceError};
pub use routing::{ResolvedRoute, RouteConfig, RouteTable, TokenBudget, bundle_names};
pub use sources::{
    CalendarEvent, CalendarSource, Contact, ContactSource, ConversationMessage,
    ConversationSource, Coordinates, DataSources, EntityResolver, GroceryItem, GrocerySource,
    MemoryNote, MemorySource, MessageRole, Place, PlaceCategory, PlaceSource, ProfileHighlight,
    ProfileSource, RelatedItem, SignificantPlace, SignificantPlaceDetector, Task, TaskSource,
};
