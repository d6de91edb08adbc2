//! The global bundle: what every turn needs regardless of route.

use std::sync::Arc;
use std::time::Duration;

use steward_cache::{CacheOptions, DomainCache};
use steward_core::{AppContext, BundleTier, ContextBundle, Domain, ProfileSource, bundle_names};
use tracing::warn;

use crate::{clock, token};

pub(crate) const PROFILE_KEY: &str = "profile:highlights";

/// Builds the `## Right Now` section placed ahead of every route's bundles.
pub struct GlobalBundle {
    profile: Arc<dyn ProfileSource>,
    cache: Arc<DomainCache>,
    ttl: Duration,
}

impl GlobalBundle {
    pub fn new(profile: Arc<dyn ProfileSource>, cache: Arc<DomainCache>, ttl: Duration) -> Self {
        Self { profile, cache, ttl }
    }

    /// Never fails. A profile lookup error only drops the highlights line.
    pub async fn build(&self, ctx: &AppContext) -> ContextBundle {
        let local = clock::local_now(ctx);
        let mut out = String::from("## Right Now\n");
        out.push_str(&format!(
            "Current time: {} ({})",
            local.format("%A, %B %-d, %Y %-I:%M %p"),
            local.timezone().name()
        ));

        let highlights = self
            .cache
            .get_or_compute(PROFILE_KEY, CacheOptions::tagged(self.ttl, Domain::Profile), || {
                self.profile.highlights()
            })
            .await;
        match highlights {
            Ok(items) if !items.is_empty() => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|h| format!("{}: {}", h.label, h.value))
                    .collect();
                out.push_str(&format!("\nAbout the user: {}", parts.join("; ")));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "profile highlights unavailable"),
        }

        if ctx.is_admin {
            out.push_str("\nAdmin access: enabled for this user.");
        }

        let tokens = token::estimate_tokens(&out);
        ContextBundle::new(bundle_names::GLOBAL, BundleTier::Global, out, tokens)
    }
}
