//! `steward assemble` — Assemble the context for one turn.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use steward_cache::DomainCache;
use steward_config::AppConfig;
use steward_context::{ContextAssembler, warm_cache};
use steward_core::{AppContext, DEFAULT_ROUTE, DataSources, Domain};
use steward_store::{Fixture, InMemoryStore, ProximityDetector};
use tracing::info;

#[derive(Args, Debug)]
pub struct AssembleArgs {
    /// Calling context: an app screen (`/tasks`) or `sms`
    #[arg(short, long, default_value = DEFAULT_ROUTE)]
    pub route: String,

    /// The user's message for this turn
    #[arg(short, long)]
    pub message: String,

    /// JSON fixture with tasks, events, places, notes, ...
    #[arg(short, long)]
    pub fixture: Option<PathBuf>,

    /// Conversation id (enables conversation and cross-domain bundles)
    #[arg(short, long)]
    pub conversation: Option<String>,

    /// Assemble as an admin user
    #[arg(long)]
    pub admin: bool,

    /// IANA timezone for the user (defaults to the configured one)
    #[arg(long)]
    pub timezone: Option<String>,

    /// Warm the cache before assembling
    #[arg(long)]
    pub warm: bool,

    /// Print the full result and metadata as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: AssembleArgs) -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load config")?;

    let fixture = match &args.fixture {
        Some(path) => Fixture::load(path)?,
        None => Fixture::default(),
    };

    let cache = Arc::new(DomainCache::new(config.cache.max_entries));
    let store = Arc::new(InMemoryStore::from_fixture(fixture).with_cache(cache.clone()));
    let sources = DataSources::from_single(store.clone());
    let detector = Arc::new(
        ProximityDetector::new(store.clone(), config.proximity.clone())
            .with_cache(cache.clone(), config.cache.ttl_for(Domain::Locations)),
    );
    let assembler = ContextAssembler::from_config(
        &config,
        cache.clone(),
        &sources,
        Some(detector),
        Some(store.clone()),
    );

    if args.warm {
        let report = warm_cache(&cache, &sources, &config).await;
        info!(
            computed = report.computed.len(),
            failed = report.failed.len(),
            "cache warmed"
        );
    }

    let mut ctx = AppContext::new(args.route, args.message)
        .with_timezone(args.timezone.unwrap_or_else(|| config.default_timezone.clone()))
        .with_admin(args.admin);
    if let Some(conversation) = args.conversation {
        ctx = ctx.with_conversation(conversation);
    }

    let assembled = assembler.assemble(&ctx).await;

    if args.json {
        let output = serde_json::json!({
            "context": assembled,
            "cache": cache.stats(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", assembled.text);

    let meta = &assembled.metadata;
    eprintln!();
    eprintln!(
        "route {}{} | {} tokens of {} ({:.1}%)",
        meta.resolved_route,
        if meta.fell_back { " (fallback)" } else { "" },
        meta.total_tokens,
        meta.budget_total,
        meta.utilization_pct
    );
    if let Some(place) = &meta.promoted {
        eprintln!("locations promoted: at {place}");
    }
    if meta.tertiary_skipped {
        eprintln!("tertiary tier skipped");
    }
    for omitted in &meta.omitted {
        eprintln!("omitted {} ({}): {}", omitted.name, omitted.tier, omitted.reason);
    }
    Ok(())
}
