//! Data source implementations for Steward.
//!
//! The router reads application state only through the traits in
//! `steward-core`. This crate provides the in-memory implementation used by
//! the CLI and tests, fixture loading, and the reference significant-place
//! detector.

pub mod fixture;
pub mod in_memory;
pub mod proximity;

pub use fixture::Fixture;
pub use in_memory::InMemoryStore;
pub use proximity::{ProximityDetector, haversine_meters};
