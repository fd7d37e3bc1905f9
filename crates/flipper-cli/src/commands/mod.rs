//! # CLI Commands
//!
//! Subcommand implementations for the flipper CLI.

pub mod check;
pub mod init;
pub mod run;
pub mod scan;

use crate::cli::Cli;
use flipper_core::FlipperConfig;

/// Load configuration from the `--config` path or the default location.
pub fn load_config(cli: &Cli) -> anyhow::Result<FlipperConfig> {
    let config = match &cli.config {
        Some(path) => FlipperConfig::load_from(path)?,
        None => FlipperConfig::load()?,
    };
    Ok(config)
}
