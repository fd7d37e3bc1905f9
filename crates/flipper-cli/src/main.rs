//! # Flipper CLI
//!
//! The main entry point for the trading post flipper.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging - default to info, RUST_LOG overrides
    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Handle commands
    match cli.command {
        Some(Commands::Scan { limit }) => {
            commands::scan::run(&cli, limit).await?;
        }
        Some(Commands::Check) => {
            commands::check::run(&cli).await?;
        }
        Some(Commands::Init { force }) => {
            commands::init::run(force)?;
        }
        Some(Commands::Run) | None => {
            commands::run::run(&cli).await?;
        }
    }

    Ok(())
}
