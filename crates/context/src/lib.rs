//! # Steward Context
//!
//! Tiered, budget-bounded context assembly. Given an [`AppContext`] for one
//! user turn, the [`ContextAssembler`] picks bundles for the route, renders
//! them through the shared cache and concatenates them into one string that
//! fits the token budget.
//!
//! ```text
//!  AppContext ──► resolve route ──► promote? ──► primary ─► secondary ─┐
//!                                                                      │ barrier
//!        global ◄── always first                 tertiary? ◄───────────┘
//!                                                    │
//!                                  cross-domain ◄────┘ (conversation turns)
//! ```
//!
//! [`AppContext`]: steward_core::AppContext

pub mod assembler;
pub mod bundles;
pub mod clock;
pub mod cross_domain;
pub mod global;
pub mod promotion;
pub mod token;

pub use assembler::{
    AssembledContext, AssemblyMetadata, BundleStats, ContextAssembler, OmittedBundle,
};
pub use bundles::{default_registry, warm_cache};
pub use cross_domain::CrossDomainBuilder;
pub use global::GlobalBundle;
pub use token::{estimate_tokens, truncate_to_tokens};
