//! Error types for the Steward domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Steward operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Data source errors ---
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    // --- Bundle errors ---
    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from external readers: data sources, the significant-place
/// detector and the cross-domain entity resolver.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Query against {source_name} failed: {reason}")]
    QueryFailed { source_name: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl SourceError {
    pub fn query(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::QueryFailed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// Failures raised by a bundle builder.
#[derive(Debug, Clone, Error)]
pub enum BundleError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Bundle not registered: {0}")]
    NotRegistered(String),

    #[error("Bundle {bundle} failed: {reason}")]
    Failed { bundle: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_displays_correctly() {
        let err = Error::Source(SourceError::query("tasks", "connection reset"));
        assert!(err.to_string().contains("tasks"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn bundle_error_wraps_source_transparently() {
        let err: BundleError = SourceError::Unavailable("calendar offline".into()).into();
        assert_eq!(err.to_string(), "Source unavailable: calendar offline");
    }

    #[test]
    fn bundle_failure_names_the_bundle() {
        let err = Error::Bundle(BundleError::Failed {
            bundle: "grocery".into(),
            reason: "render panicked".into(),
        });
        assert!(err.to_string().contains("grocery"));
        assert!(err.to_string().contains("render panicked"));
    }
}
