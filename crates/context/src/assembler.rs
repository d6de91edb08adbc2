//! Context assembly pipeline — the core of the router.
//!
//! Assembles one context string per user turn from tiered bundles:
//!
//! 1. **Global** (time, profile, admin note) — always first, never capped
//! 2. **Primary** — the route's main bundles, primary budget each
//! 3. **Secondary** — supporting bundles, secondary budget each
//! 4. **Tertiary** — only when primary + secondary left room for it
//! 5. **Cross-domain** — entity summaries for conversation turns, appended last
//!
//! # Failure isolation
//!
//! Assembly never fails. A builder error, an unregistered bundle name or a
//! failed promotion signal is logged and recorded in the metadata, and the
//! rest of the context is still produced.
//!
//! # Determinism
//!
//! Builders within a tier run concurrently, but results are always placed
//! in route order. Identical route, promotion outcome and builder results
//! produce identical output.

use std::borrow::Cow;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use steward_cache::DomainCache;
use steward_config::AppConfig;
use steward_core::{
    AppContext, BundleRegistry, BundleTier, ContextBundle, DataSources, Domain, EntityResolver,
    RouteConfig, RouteTable, SignificantPlaceDetector, TokenBudget,
};
use tracing::{debug, info, warn};

use crate::bundles::default_registry;
use crate::cross_domain::CrossDomainBuilder;
use crate::global::GlobalBundle;
use crate::{promotion, token};

/// Separator between sections of the assembled context.
pub const SECTION_SEPARATOR: &str = "\n\n";

// ── Types ─────────────────────────────────────────────────────────────────

/// The assembled context for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Final context text handed to the model.
    pub text: String,
    /// Every bundle that was built, in output order (empty ones included).
    pub bundles: Vec<ContextBundle>,
    /// Assembly metadata (routing, token counts, omissions).
    pub metadata: AssemblyMetadata,
}

/// Detailed metadata about the assembly process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Route the caller asked for.
    pub requested_route: String,
    /// Route whose configuration was used.
    pub resolved_route: String,
    /// True when the requested route was unknown.
    pub fell_back: bool,
    /// Significant place that triggered locations promotion, if any.
    pub promoted: Option<String>,
    /// Total estimated tokens across included bundles.
    pub total_tokens: usize,
    /// Configured total budget.
    pub budget_total: usize,
    /// Budget utilization percentage.
    pub utilization_pct: f32,
    /// Per-bundle statistics, in output order.
    pub per_bundle: Vec<BundleStats>,
    /// Bundles that failed or were not registered.
    pub omitted: Vec<OmittedBundle>,
    /// True when the tertiary tier was skipped for lack of budget.
    pub tertiary_skipped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleStats {
    pub name: String,
    pub tier: BundleTier,
    pub tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmittedBundle {
    pub name: String,
    pub tier: BundleTier,
    pub reason: String,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context router. Build one at startup and share it across requests.
pub struct ContextAssembler {
    registry: BundleRegistry,
    routes: RouteTable,
    budget: TokenBudget,
    global: GlobalBundle,
    detector: Option<Arc<dyn SignificantPlaceDetector>>,
    cross_domain: Option<CrossDomainBuilder>,
}

impl ContextAssembler {
    pub fn new(
        registry: BundleRegistry,
        routes: RouteTable,
        budget: TokenBudget,
        global: GlobalBundle,
    ) -> Self {
        Self {
            registry,
            routes,
            budget,
            global,
            detector: None,
            cross_domain: None,
        }
    }

    /// Enable locations promotion from a significant-place signal.
    pub fn with_detector(mut self, detector: Arc<dyn SignificantPlaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Enable the cross-domain bundle for conversation turns.
    pub fn with_cross_domain(mut self, builder: CrossDomainBuilder) -> Self {
        self.cross_domain = Some(builder);
        self
    }

    /// Wire up the built-in bundles, routes and budgets from configuration.
    pub fn from_config(
        config: &AppConfig,
        cache: Arc<DomainCache>,
        sources: &DataSources,
        detector: Option<Arc<dyn SignificantPlaceDetector>>,
        resolver: Option<Arc<dyn EntityResolver>>,
    ) -> Self {
        let registry = default_registry(cache.clone(), sources, config);
        let global = GlobalBundle::new(
            sources.profile.clone(),
            cache,
            config.cache.ttl_for(Domain::Profile),
        );
        let routes = config.route_table();
        for (route, tiers) in routes.iter() {
            for name in tiers.all_bundles().filter(|name| !registry.contains(name)) {
                warn!(route, bundle = name, "route names an unregistered bundle");
            }
        }
        let mut assembler = Self::new(registry, routes, config.budget, global);
        if let Some(detector) = detector {
            assembler = assembler.with_detector(detector);
        }
        if let Some(resolver) = resolver {
            let limits = &config.assembler;
            assembler = assembler.with_cross_domain(CrossDomainBuilder::new(resolver).with_limits(
                limits.conversation_window,
                limits.cross_domain_max_entities,
                limits.cross_domain_max_tokens,
            ));
        }
        assembler
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    pub fn registry(&self) -> &BundleRegistry {
        &self.registry
    }

    /// Assemble the context for one turn.
    ///
    /// # Algorithm
    ///
    /// 1. Build the global bundle and query the promotion signal concurrently;
    ///    the signal is recorded on a turn-local context for every builder
    /// 2. Resolve the route (unknown routes fall back to `sms`)
    /// 3. Promote locations into a request-local copy of the route if signalled
    /// 4. Build primary, then secondary bundles with their tier budgets
    /// 5. Build tertiary only if tokens so far are below `total - tertiary`
    /// 6. Append the cross-domain bundle for conversation turns
    /// 7. Join non-empty sections with a blank line
    pub async fn assemble(&self, ctx: &AppContext) -> AssembledContext {
        let (global, detected) = tokio::join!(
            self.global.build(ctx),
            promotion::detect(self.detector.as_deref())
        );

        // One signal per turn: promotion and the bundles read the same answer.
        let signal = match &self.detector {
            Some(_) => detected,
            None => ctx.significant_place.clone(),
        };
        let turn_ctx: Cow<'_, AppContext> = if signal == ctx.significant_place {
            Cow::Borrowed(ctx)
        } else {
            Cow::Owned(ctx.clone().with_significant_place(signal.clone()))
        };
        let turn = &*turn_ctx;

        let resolved = self.routes.resolve(&ctx.route);
        if resolved.fell_back {
            debug!(route = %ctx.route, fallback = resolved.name, "unknown route, using fallback");
        }
        let route: Cow<'_, RouteConfig> = promotion::apply(resolved.config, signal.as_ref());
        let promoted = match (&route, signal) {
            (Cow::Owned(_), Some(place)) => Some(place.name),
            _ => None,
        };

        let mut bundles = vec![global];
        let mut omitted = Vec::new();

        for tier in [BundleTier::Primary, BundleTier::Secondary] {
            let built = self.build_tier(turn, route.tier(tier), tier, &mut omitted).await;
            bundles.extend(built);
        }

        // Tier barrier: tertiary only fits when earlier tiers left room.
        let used: usize = bundles.iter().map(|b| b.token_estimate).sum();
        let tertiary = route.tier(BundleTier::Tertiary);
        let tertiary_skipped = !tertiary.is_empty() && used >= self.budget.tertiary_threshold();
        if tertiary_skipped {
            debug!(
                used,
                threshold = self.budget.tertiary_threshold(),
                "skipping tertiary tier"
            );
        } else {
            let built = self
                .build_tier(turn, tertiary, BundleTier::Tertiary, &mut omitted)
                .await;
            bundles.extend(built);
        }

        if let Some(builder) = &self.cross_domain
            && let Some(bundle) = builder.build(turn).await
        {
            bundles.push(bundle);
        }

        let text = bundles
            .iter()
            .filter(|b| !b.is_empty())
            .map(|b| b.content.as_str())
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR);

        let per_bundle: Vec<BundleStats> = bundles
            .iter()
            .filter(|b| !b.is_empty())
            .map(|b| BundleStats {
                name: b.name.clone(),
                tier: b.tier,
                tokens: b.token_estimate,
            })
            .collect();
        let total_tokens: usize = per_bundle.iter().map(|s| s.tokens).sum();
        let utilization_pct = if self.budget.total == 0 {
            0.0
        } else {
            (total_tokens as f32 / self.budget.total as f32) * 100.0
        };

        info!(
            route = %ctx.route,
            resolved = resolved.name,
            bundles = per_bundle.len(),
            omitted = omitted.len(),
            total_tokens,
            "assembled context"
        );

        AssembledContext {
            text,
            bundles,
            metadata: AssemblyMetadata {
                requested_route: ctx.route.clone(),
                resolved_route: resolved.name.to_string(),
                fell_back: resolved.fell_back,
                promoted,
                total_tokens,
                budget_total: self.budget.total,
                utilization_pct,
                per_bundle,
                omitted,
                tertiary_skipped,
            },
        }
    }

    /// Build every bundle of one tier concurrently, keeping route order.
    async fn build_tier(
        &self,
        ctx: &AppContext,
        names: &[String],
        tier: BundleTier,
        omitted: &mut Vec<OmittedBundle>,
    ) -> Vec<ContextBundle> {
        let cap = self.budget.tier_cap(tier).unwrap_or(self.budget.total);
        let results = join_all(names.iter().map(|name| self.registry.build(name, ctx, cap))).await;

        let mut built = Vec::with_capacity(names.len());
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(mut bundle) => {
                    bundle.tier = tier;
                    if token::estimate_tokens(&bundle.content) > cap {
                        warn!(bundle = %name, cap, "bundle exceeded its budget, truncating");
                        bundle.content = token::truncate_to_tokens(&bundle.content, cap);
                    }
                    bundle.token_estimate = token::estimate_tokens(&bundle.content);
                    built.push(bundle);
                }
                Err(e) => {
                    warn!(bundle = %name, %tier, error = %e, "bundle failed, omitting");
                    omitted.push(OmittedBundle {
                        name: name.clone(),
                        tier,
                        reason: e.to_string(),
                    });
                }
            }
        }
        built
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use steward_core::{
        BundleBuilder, BundleError, PlaceCategory, ProfileHighlight, ProfileSource,
        SignificantPlace, SourceError,
    };

    /// Builder that returns fixed text, or fails.
    struct Fixed {
        name: &'static str,
        text: Option<String>,
    }

    #[async_trait]
    impl BundleBuilder for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        async fn build(
            &self,
            _ctx: &AppContext,
            max_tokens: usize,
        ) -> Result<ContextBundle, BundleError> {
            match &self.text {
                Some(text) => {
                    let content = token::truncate_to_tokens(text, max_tokens);
                    let tokens = token::estimate_tokens(&content);
                    Ok(ContextBundle::new(self.name, BundleTier::Primary, content, tokens))
                }
                None => Err(BundleError::Failed {
                    bundle: self.name.into(),
                    reason: "backend down".into(),
                }),
            }
        }
    }

    /// Ignores `max_tokens` to exercise the assembler's own cap.
    struct Greedy;

    #[async_trait]
    impl BundleBuilder for Greedy {
        fn name(&self) -> &str {
            "greedy"
        }
        async fn build(
            &self,
            _ctx: &AppContext,
            _max_tokens: usize,
        ) -> Result<ContextBundle, BundleError> {
            let content = "g".repeat(40_000);
            Ok(ContextBundle::new("greedy", BundleTier::Primary, content, 1))
        }
    }

    struct NoProfile;

    #[async_trait]
    impl ProfileSource for NoProfile {
        async fn highlights(&self) -> Result<Vec<ProfileHighlight>, SourceError> {
            Ok(vec![])
        }
    }

    struct AtPlace;

    #[async_trait]
    impl SignificantPlaceDetector for AtPlace {
        async fn current_place(&self) -> Result<Option<SignificantPlace>, SourceError> {
            Ok(Some(SignificantPlace {
                name: "Corner Market".into(),
                category: PlaceCategory::Frequent,
            }))
        }
    }

    struct BrokenDetector;

    #[async_trait]
    impl SignificantPlaceDetector for BrokenDetector {
        async fn current_place(&self) -> Result<Option<SignificantPlace>, SourceError> {
            Err(SourceError::Unavailable("gps".into()))
        }
    }

    fn fixed(name: &'static str, text: &str) -> Box<dyn BundleBuilder> {
        Box::new(Fixed {
            name,
            text: Some(text.to_string()),
        })
    }

    fn failing(name: &'static str) -> Box<dyn BundleBuilder> {
        Box::new(Fixed { name, text: None })
    }

    fn global() -> GlobalBundle {
        GlobalBundle::new(
            Arc::new(NoProfile),
            Arc::new(DomainCache::default()),
            Duration::from_secs(600),
        )
    }

    fn routes() -> RouteTable {
        let mut routes = RouteTable::empty();
        routes.insert("sms", RouteConfig::new(&["a"], &["b"], &["c"]));
        routes.insert("/grocery", RouteConfig::new(&["grocery"], &["locations"], &["tasks"]));
        routes
    }

    fn registry(builders: Vec<Box<dyn BundleBuilder>>) -> BundleRegistry {
        let mut registry = BundleRegistry::new();
        for b in builders {
            registry.register(b);
        }
        registry
    }

    fn abc() -> BundleRegistry {
        registry(vec![
            fixed("a", "## A\nprimary"),
            fixed("b", "## B\nsecondary"),
            fixed("c", "## C\ntertiary"),
        ])
    }

    #[tokio::test]
    async fn output_follows_tier_order() {
        let assembler = ContextAssembler::new(abc(), routes(), TokenBudget::default(), global());
        let out = assembler.assemble(&AppContext::new("sms", "hi")).await;

        let pos = |s: &str| out.text.find(s).unwrap();
        assert!(pos("## Right Now") < pos("## A"));
        assert!(pos("## A") < pos("## B"));
        assert!(pos("## B") < pos("## C"));
        assert!(out.text.contains("primary\n\n## B"));
        assert!(!out.metadata.tertiary_skipped);
        assert_eq!(out.metadata.per_bundle.len(), 4);
        assert_eq!(out.metadata.per_bundle[3].tier, BundleTier::Tertiary);
    }

    #[tokio::test]
    async fn unknown_route_falls_back_to_sms() {
        let assembler = ContextAssembler::new(abc(), routes(), TokenBudget::default(), global());
        let out = assembler.assemble(&AppContext::new("/nowhere", "hi")).await;
        assert!(out.metadata.fell_back);
        assert_eq!(out.metadata.resolved_route, "sms");
        assert_eq!(out.metadata.requested_route, "/nowhere");
        assert!(out.text.contains("## A"));
    }

    #[tokio::test]
    async fn tertiary_skipped_when_budget_used() {
        let budget = TokenBudget {
            primary: 2000,
            secondary: 800,
            tertiary: 400,
            global: 1000,
            total: 1000,
        };
        let reg = registry(vec![
            fixed("a", &"x".repeat(4000)),
            fixed("b", "## B"),
            fixed("c", "## C\ntertiary"),
        ]);
        let assembler = ContextAssembler::new(reg, routes(), budget, global());
        let out = assembler.assemble(&AppContext::new("sms", "hi")).await;
        assert!(out.metadata.tertiary_skipped);
        assert!(!out.text.contains("tertiary"));
        assert!(out.text.contains("## B"));
    }

    #[tokio::test]
    async fn failing_bundle_is_omitted() {
        let reg = registry(vec![failing("a"), fixed("b", "## B"), fixed("c", "## C")]);
        let assembler = ContextAssembler::new(reg, routes(), TokenBudget::default(), global());
        let out = assembler.assemble(&AppContext::new("sms", "hi")).await;

        assert!(out.text.contains("## B"));
        assert!(out.text.contains("## C"));
        assert_eq!(out.metadata.omitted.len(), 1);
        assert_eq!(out.metadata.omitted[0].name, "a");
        assert!(out.metadata.omitted[0].reason.contains("backend down"));
    }

    #[tokio::test]
    async fn unregistered_bundle_is_omitted() {
        let reg = registry(vec![fixed("a", "## A")]);
        let assembler = ContextAssembler::new(reg, routes(), TokenBudget::default(), global());
        let out = assembler.assemble(&AppContext::new("sms", "hi")).await;
        let names: Vec<&str> = out.metadata.omitted.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(out.text.contains("## A"));
    }

    #[tokio::test]
    async fn promotion_moves_locations_ahead() {
        let reg = registry(vec![
            fixed("grocery", "## Grocery List\n- milk"),
            fixed("locations", "## Places\nCurrently at: Corner Market"),
            fixed("tasks", "## Tasks Overview"),
        ]);
        let assembler = ContextAssembler::new(reg, routes(), TokenBudget::default(), global())
            .with_detector(Arc::new(AtPlace));
        let out = assembler.assemble(&AppContext::new("/grocery", "")).await;

        assert_eq!(out.metadata.promoted.as_deref(), Some("Corner Market"));
        let places = out.bundles.iter().find(|b| b.name == "locations").unwrap();
        assert_eq!(places.tier, BundleTier::Primary);
        // Shared table untouched.
        assert_eq!(
            assembler.routes().get("/grocery").unwrap().secondary,
            vec!["locations"]
        );
    }

    #[tokio::test]
    async fn promotion_failure_is_ignored() {
        let reg = registry(vec![
            fixed("grocery", "## G"),
            fixed("locations", "## P"),
            fixed("tasks", "## T"),
        ]);
        let assembler = ContextAssembler::new(reg, routes(), TokenBudget::default(), global())
            .with_detector(Arc::new(BrokenDetector));
        let out = assembler.assemble(&AppContext::new("/grocery", "")).await;
        assert!(out.metadata.promoted.is_none());
        let places = out.bundles.iter().find(|b| b.name == "locations").unwrap();
        assert_eq!(places.tier, BundleTier::Secondary);
    }

    #[tokio::test]
    async fn over_budget_bundle_is_capped() {
        let mut routes = RouteTable::empty();
        routes.insert("sms", RouteConfig::new(&["greedy"], &[], &[]));
        let assembler = ContextAssembler::new(
            registry(vec![Box::new(Greedy)]),
            routes,
            TokenBudget::default(),
            global(),
        );
        let out = assembler.assemble(&AppContext::new("sms", "")).await;
        let greedy = out.bundles.iter().find(|b| b.name == "greedy").unwrap();
        assert!(greedy.token_estimate <= 2000);
        assert_eq!(greedy.token_estimate, token::estimate_tokens(&greedy.content));
    }

    #[tokio::test]
    async fn empty_bundles_are_skipped_in_text() {
        let reg = registry(vec![fixed("a", ""), fixed("b", "## B"), fixed("c", "## C")]);
        let assembler = ContextAssembler::new(reg, routes(), TokenBudget::default(), global());
        let out = assembler.assemble(&AppContext::new("sms", "")).await;
        assert!(!out.text.contains("\n\n\n\n"));
        assert!(out.metadata.per_bundle.iter().all(|s| s.name != "a"));
    }
}
