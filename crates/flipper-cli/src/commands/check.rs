//! # Check Command
//!
//! Verify the environment before a run: config loads, the game
//! process is up, landmark templates are present, side files parse.

use crate::cli::Cli;
use colored::Colorize;
use flipper_core::{Blacklist, LandmarkId, LandmarkSet};
use flipper_vision::verify::{CorrectionTable, MismatchLog};
use sysinfo::{ProcessesToUpdate, System};

fn ok(label: &str, detail: impl std::fmt::Display) {
    println!("{} {label}: {detail}", "✓".green());
}

fn fail(label: &str, detail: impl std::fmt::Display) {
    println!("{} {label}: {detail}", "✗".red());
}

/// True when a process whose name starts with `name` is running.
fn process_running(name: &str) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
        .processes()
        .values()
        .any(|p| p.name().to_string_lossy().starts_with(name))
}

/// Run the check command
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut problems = 0usize;

    let config = match super::load_config(cli) {
        Ok(config) => {
            ok("config", "loaded and valid");
            config
        }
        Err(e) => {
            fail("config", e);
            anyhow::bail!("cannot continue without a valid config");
        }
    };

    if process_running(&config.game.process_name) {
        ok("game process", &config.game.process_name);
    } else {
        fail("game process", format!("{} not running", config.game.process_name));
        problems += 1;
    }

    match LandmarkSet::load(&config.game.templates_dir, config.game.match_tolerance) {
        Ok(_) => ok(
            "templates",
            format!(
                "{} landmarks in {}",
                LandmarkId::ALL.len(),
                config.game.templates_dir.display()
            ),
        ),
        Err(e) => {
            fail("templates", e);
            problems += 1;
        }
    }

    match Blacklist::load(config.paths.blacklist_path()) {
        Ok(blacklist) => ok(
            "blacklist",
            format!("{} ids, {} names", blacklist.ids.len(), blacklist.names.len()),
        ),
        Err(e) => {
            fail("blacklist", e);
            problems += 1;
        }
    }

    match CorrectionTable::load(config.paths.corrections_path()) {
        Ok(table) => ok("corrections", format!("{} entries", table.len())),
        Err(e) => {
            fail("corrections", e);
            problems += 1;
        }
    }

    match MismatchLog::load(config.paths.mismatch_log_path()) {
        Ok(log) => ok("mismatch log", format!("{} entries", log.len())),
        Err(e) => {
            fail("mismatch log", e);
            problems += 1;
        }
    }

    if problems == 0 {
        println!("\n{}", "All checks passed.".green());
    } else {
        println!("\n{problems} problem(s) found.");
    }
    Ok(())
}
