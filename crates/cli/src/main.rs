//! Steward CLI — the main entry point.
//!
//! Commands:
//! - `routes`   — Show the effective route table and token budget
//! - `assemble` — Assemble the context for one turn from a fixture
//! - `config`   — Show, validate, locate or print the default configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "steward",
    about = "Steward — tiered context routing for a personal assistant",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the route table and token budget
    Routes,

    /// Assemble the context for a single turn
    Assemble(commands::assemble::AssembleArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Load and validate the configuration
    Validate,
    /// Print the configuration file path
    Path,
    /// Print the built-in default configuration as TOML
    Default,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so assembled output can be piped.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Routes => commands::routes::run()?,
        Commands::Assemble(args) => commands::assemble::run(args).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Validate => commands::config_cmd::validate()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Default => commands::config_cmd::print_default(),
        },
    }

    Ok(())
}
