//! Bundle builder trait — the abstraction over context sources.
//!
//! A bundle is a named, token-bounded slice of formatted context text for
//! one topical domain (tasks, calendar, places, ...). Builders render
//! bundles on demand; the assembler decides which ones to call and in what
//! order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::context::AppContext;
use crate::error::BundleError;

/// Inclusion priority of a bundle within an assembled context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleTier {
    Global,
    Primary,
    Secondary,
    Tertiary,
    CrossDomain,
}

impl fmt::Display for BundleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BundleTier::Global => "global",
            BundleTier::Primary => "primary",
            BundleTier::Secondary => "secondary",
            BundleTier::Tertiary => "tertiary",
            BundleTier::CrossDomain => "cross_domain",
        };
        f.write_str(s)
    }
}

/// A rendered bundle, created fresh per request and discarded after assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub name: String,
    pub tier: BundleTier,
    pub content: String,
    pub token_estimate: usize,
}

impl ContextBundle {
    pub fn new(
        name: impl Into<String>,
        tier: BundleTier,
        content: impl Into<String>,
        token_estimate: usize,
    ) -> Self {
        Self {
            name: name.into(),
            tier,
            content: content.into(),
            token_estimate,
        }
    }

    /// A bundle with nothing to say. Skipped during concatenation.
    pub fn empty(name: impl Into<String>, tier: BundleTier) -> Self {
        Self::new(name, tier, String::new(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// The bundle builder contract.
///
/// Builders are asynchronous (they may hit the cache, which may compute on
/// miss) and must truncate their own output to `max_tokens` before
/// returning.
#[async_trait]
pub trait BundleBuilder: Send + Sync {
    /// The unique bundle name referenced by route configuration.
    fn name(&self) -> &str;

    /// Render the bundle for this request. The returned bundle's tier is
    /// overwritten by the assembler.
    async fn build(
        &self,
        ctx: &AppContext,
        max_tokens: usize,
    ) -> Result<ContextBundle, BundleError>;
}

/// A registry of bundle builders keyed by bundle name.
pub struct BundleRegistry {
    builders: HashMap<String, Box<dyn BundleBuilder>>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Register a builder. Replaces any existing builder with the same name.
    pub fn register(&mut self, builder: Box<dyn BundleBuilder>) {
        let name = builder.name().to_string();
        self.builders.insert(name, builder);
    }

    /// Get a builder by name.
    pub fn get(&self, name: &str) -> Option<&dyn BundleBuilder> {
        self.builders.get(name).map(|b| b.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Build a bundle by name.
    pub async fn build(
        &self,
        name: &str,
        ctx: &AppContext,
        max_tokens: usize,
    ) -> Result<ContextBundle, BundleError> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| BundleError::NotRegistered(name.to_string()))?;
        builder.build(ctx, max_tokens).await
    }

    /// All registered bundle names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builders.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

impl Default for BundleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoBundle;

    #[async_trait]
    impl BundleBuilder for EchoBundle {
        fn name(&self) -> &str {
            "echo"
        }
        async fn build(
            &self,
            ctx: &AppContext,
            _max_tokens: usize,
        ) -> Result<ContextBundle, BundleError> {
            Ok(ContextBundle::new("echo", BundleTier::Primary, ctx.user_message.clone(), 1))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = BundleRegistry::new();
        registry.register(Box::new(EchoBundle));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn registry_builds_bundle() {
        let mut registry = BundleRegistry::new();
        registry.register(Box::new(EchoBundle));

        let ctx = AppContext::new("sms", "ping");
        let bundle = registry.build("echo", &ctx, 100).await.unwrap();
        assert_eq!(bundle.content, "ping");
    }

    #[tokio::test]
    async fn registry_build_missing_bundle() {
        let registry = BundleRegistry::new();
        let ctx = AppContext::new("sms", "ping");
        let err = registry.build("nope", &ctx, 100).await.unwrap_err();
        assert!(matches!(err, BundleError::NotRegistered(_)));
    }

    #[test]
    fn tiers_order_by_priority() {
        assert!(BundleTier::Global < BundleTier::Primary);
        assert!(BundleTier::Secondary < BundleTier::Tertiary);
        assert!(BundleTier::Tertiary < BundleTier::CrossDomain);
    }
}
