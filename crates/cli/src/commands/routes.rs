//! `steward routes` — Show the effective route table.

use anyhow::Context;
use steward_config::AppConfig;
use steward_core::DEFAULT_ROUTE;

pub fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load config")?;
    let budget = config.budget;

    println!("Token budget");
    println!(
        "  primary {}  secondary {}  tertiary {}  global {}  total {}",
        budget.primary, budget.secondary, budget.tertiary, budget.global, budget.total
    );
    println!("  tertiary built while used < {}", budget.tertiary_threshold());
    println!();

    let join = |names: &[String]| {
        if names.is_empty() {
            "-".to_string()
        } else {
            names.join(", ")
        }
    };

    println!("{:<14} {:<28} {:<28} {}", "ROUTE", "PRIMARY", "SECONDARY", "TERTIARY");
    for (route, tiers) in config.route_table().iter() {
        let marker = if route == DEFAULT_ROUTE { " *" } else { "" };
        println!(
            "{:<14} {:<28} {:<28} {}",
            format!("{route}{marker}"),
            join(&tiers.primary),
            join(&tiers.secondary),
            join(&tiers.tertiary)
        );
    }
    println!();
    println!("* fallback for unknown routes");
    Ok(())
}
