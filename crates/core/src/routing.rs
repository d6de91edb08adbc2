//! Route table and token budget — the static configuration the router reads.
//!
//! A route identifies the calling context (an app screen such as `/tasks`,
//! or the `sms` fallback). Each route maps to three ordered lists of bundle
//! names. The table is loaded once and read-only afterwards; promotion
//! derives a request-local copy instead of mutating it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bundle::BundleTier;
use crate::context::DEFAULT_ROUTE;

/// Well-known bundle names.
pub mod bundle_names {
    pub const TASKS: &str = "tasks";
    pub const CALENDAR: &str = "calendar";
    pub const LOCATIONS: &str = "locations";
    pub const MEMORY: &str = "memory";
    pub const GROCERY: &str = "grocery";
    pub const CONTACTS: &str = "contacts";
    pub const CONVERSATION: &str = "conversation";
    pub const GLOBAL: &str = "global";
    pub const CROSS_DOMAIN: &str = "cross_domain";
}

/// Per-tier token caps plus the global ceiling. Not mutated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    #[serde(default = "default_primary")]
    pub primary: usize,
    #[serde(default = "default_secondary")]
    pub secondary: usize,
    #[serde(default = "default_tertiary")]
    pub tertiary: usize,
    /// Advisory size of the global bundle. It is never truncated.
    #[serde(default = "default_global")]
    pub global: usize,
    #[serde(default = "default_total")]
    pub total: usize,
}

fn default_primary() -> usize {
    2000
}
fn default_secondary() -> usize {
    800
}
fn default_tertiary() -> usize {
    400
}
fn default_global() -> usize {
    1000
}
fn default_total() -> usize {
    6000
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            secondary: default_secondary(),
            tertiary: default_tertiary(),
            global: default_global(),
            total: default_total(),
        }
    }
}

impl TokenBudget {
    /// Cap for bundles built in `tier`. Global and cross-domain bundles are
    /// outside the tiered budgets.
    pub fn tier_cap(&self, tier: BundleTier) -> Option<usize> {
        match tier {
            BundleTier::Primary => Some(self.primary),
            BundleTier::Secondary => Some(self.secondary),
            BundleTier::Tertiary => Some(self.tertiary),
            BundleTier::Global | BundleTier::CrossDomain => None,
        }
    }

    /// Tertiary bundles are built only while usage stays strictly below this.
    pub fn tertiary_threshold(&self) -> usize {
        self.total.saturating_sub(self.tertiary)
    }
}

/// Ordered bundle names for each tier of one route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
    #[serde(default)]
    pub tertiary: Vec<String>,
}

static EMPTY_ROUTE: RouteConfig = RouteConfig {
    primary: Vec::new(),
    secondary: Vec::new(),
    tertiary: Vec::new(),
};

impl RouteConfig {
    pub fn new(primary: &[&str], secondary: &[&str], tertiary: &[&str]) -> Self {
        let owned =
            |names: &[&str]| -> Vec<String> { names.iter().map(|n| n.to_string()).collect() };
        Self {
            primary: owned(primary),
            secondary: owned(secondary),
            tertiary: owned(tertiary),
        }
    }

    /// Bundle names for a tier. Empty for global/cross-domain.
    pub fn tier(&self, tier: BundleTier) -> &[String] {
        match tier {
            BundleTier::Primary => &self.primary,
            BundleTier::Secondary => &self.secondary,
            BundleTier::Tertiary => &self.tertiary,
            BundleTier::Global | BundleTier::CrossDomain => &[],
        }
    }

    /// The tier a bundle is assigned to, if any (highest priority wins).
    pub fn tier_of(&self, bundle: &str) -> Option<BundleTier> {
        [BundleTier::Primary, BundleTier::Secondary, BundleTier::Tertiary]
            .into_iter()
            .find(|tier| self.tier(*tier).iter().any(|n| n == bundle))
    }

    /// Derive a copy with `bundle` moved to the end of the primary tier.
    ///
    /// Returns `None` when the bundle is already primary.
    pub fn promote(&self, bundle: &str) -> Option<RouteConfig> {
        if self.primary.iter().any(|n| n == bundle) {
            return None;
        }
        let mut promoted = self.clone();
        promoted.primary.push(bundle.to_string());
        promoted.secondary.retain(|n| n != bundle);
        promoted.tertiary.retain(|n| n != bundle);
        Some(promoted)
    }

    /// All bundle names across tiers, in tier order.
    pub fn all_bundles(&self) -> impl Iterator<Item = &str> {
        self.primary
            .iter()
            .chain(&self.secondary)
            .chain(&self.tertiary)
            .map(|s| s.as_str())
    }
}

/// Result of looking up a route.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRoute<'a> {
    /// The route whose configuration was used.
    pub name: &'a str,
    pub config: &'a RouteConfig,
    /// True when the requested route was unknown and `sms` was used instead.
    pub fell_back: bool,
}

/// Route identifier → tier configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: BTreeMap<String, RouteConfig>,
}

impl RouteTable {
    /// An empty table. Every lookup resolves to an empty configuration.
    pub fn empty() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }

    /// The built-in table shipped with the application.
    pub fn defaults() -> Self {
        use bundle_names::*;
        let mut table = Self::empty();
        table.insert(
            DEFAULT_ROUTE,
            RouteConfig::new(
                &[TASKS, CALENDAR],
                &[CONVERSATION, MEMORY],
                &[LOCATIONS, GROCERY, CONTACTS],
            ),
        );
        table.insert("/tasks", RouteConfig::new(&[TASKS], &[CALENDAR, CONVERSATION], &[MEMORY]));
        table.insert("/calendar", RouteConfig::new(&[CALENDAR], &[TASKS], &[LOCATIONS, CONTACTS]));
        table.insert("/grocery", RouteConfig::new(&[GROCERY], &[LOCATIONS], &[TASKS]));
        table.insert("/locations", RouteConfig::new(&[LOCATIONS], &[CALENDAR], &[TASKS]));
        table.insert("/memory", RouteConfig::new(&[MEMORY], &[CONTACTS, CONVERSATION], &[TASKS]));
        table.insert("/contacts", RouteConfig::new(&[CONTACTS], &[MEMORY], &[CALENDAR]));
        table.insert(
            "/chat",
            RouteConfig::new(&[CONVERSATION, TASKS], &[CALENDAR, MEMORY], &[LOCATIONS, GROCERY]),
        );
        table
    }

    /// Add or replace a route.
    pub fn insert(&mut self, route: impl Into<String>, config: RouteConfig) {
        self.routes.insert(route.into(), config);
    }

    pub fn get(&self, route: &str) -> Option<&RouteConfig> {
        self.routes.get(route)
    }

    pub fn contains(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    /// Look up `route`, falling back to the reserved `sms` configuration.
    pub fn resolve(&self, route: &str) -> ResolvedRoute<'_> {
        if let Some((name, config)) = self.routes.get_key_value(route) {
            return ResolvedRoute {
                name: name.as_str(),
                config,
                fell_back: false,
            };
        }
        match self.routes.get_key_value(DEFAULT_ROUTE) {
            Some((name, config)) => ResolvedRoute {
                name: name.as_str(),
                config,
                fell_back: true,
            },
            None => ResolvedRoute {
                name: DEFAULT_ROUTE,
                config: &EMPTY_ROUTE,
                fell_back: true,
            },
        }
    }

    /// Routes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteConfig)> {
        self.routes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `overrides` on top of this table.
    pub fn merged_with(mut self, overrides: &RouteTable) -> Self {
        for (route, config) in &overrides.routes {
            self.routes.insert(route.clone(), config.clone());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::defaults()
    }
}
