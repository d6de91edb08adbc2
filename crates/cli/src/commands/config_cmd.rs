//! `steward config` — Configuration management commands.

use anyhow::Context;
use steward_config::AppConfig;

pub fn validate() -> anyhow::Result<()> {
    println!("Validating configuration...");

    let config = AppConfig::load().context("config error")?;
    println!("  Config parsed and validated");
    println!();
    println!("  Timezone:     {}", config.default_timezone);
    println!("  Cache:        {} entries max", config.cache.max_entries);
    println!(
        "  Budget:       primary {} / secondary {} / tertiary {} / total {}",
        config.budget.primary, config.budget.secondary, config.budget.tertiary, config.budget.total
    );
    println!("  Routes:       {}", config.route_table().len());
    println!("  Proximity:    {} m", config.proximity.threshold_meters);
    Ok(())
}

pub fn show() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load config")?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}

pub fn print_default() {
    print!("{}", AppConfig::default_toml());
}
