//! # CLI Arguments
//!
//! Command-line argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Flipper - trading post automation
#[derive(Parser, Debug)]
#[command(name = "flipper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, env = "FLIPPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the flipping loop against the game window (default)
    Run,

    /// Fetch and print the current candidate list, no game needed
    Scan {
        /// Maximum candidates to print
        #[arg(short, long, default_value_t = 25)]
        limit: usize,
    },

    /// Check the environment: config, game process, templates, side files
    Check,

    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },
}
