//! # Init Command
//!
//! Write a starter config file to the default location.

use colored::Colorize;
use flipper_core::FlipperConfig;

const DEFAULT_CONFIG: &str = r#"# Flipper Configuration

[game]
# Process name of the game client
process_name = "Gw2-64"

# Directory holding the landmark template images
templates_dir = "templates"

# Template match tolerance, 1.0 = exact pixel match
match_tolerance = 1.0

[market]
# API key; needed for price_source = "api" and the undercut sweep
api_key = ""

# Where item prices come from: "ocr" or "api"
price_source = "ocr"

# Candidate filter, all prices in copper
min_profit = 100
min_sold = 50
min_buy_price = 100
max_buy_price = 100000
min_rarity = "Junk"
max_rarity = "Legendary"
pages = 3

[trade]
# Copper available per buy order
max_spend = 50000

# Fraction of daily sales volume to order
quantity_fraction = 0.1

# Plausibility band around scraped prices
error_range = 0.8

# Fraction of scraped profit still acceptable
profit_range = 0.75

# Candidates attempted per cycle before moving to selling
buys_per_cycle = 10

# Trading post fee rates
listing_fee_rate = 0.05
exchange_fee_rate = 0.10

[timing]
cycle_min_secs = 180
cycle_max_secs = 300
refresh_cooldown_secs = 900
anti_afk_secs = 1800
poll_timeout_ms = 10000
poll_interval_ms = 100

[paths]
# data_dir = "~/.local/share/flipper"
# blacklist_file = "blacklist.json"
# corrections_file = "corrections.json"
# mismatch_log = "logs/ocr_mismatches.txt"
"#;

/// Run the init command
pub fn run(force: bool) -> anyhow::Result<()> {
    let path = FlipperConfig::default_config_path()
        .ok_or_else(|| anyhow::anyhow!("no user config directory on this platform"))?;

    if path.exists() && !force {
        println!(
            "{} Config already exists at {}",
            "!".yellow(),
            path.display()
        );
        println!("Use {} to overwrite.", "--force".bright_cyan());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, DEFAULT_CONFIG)?;

    println!("{} Wrote {}", "✓".green(), path.display());
    println!("Edit it, drop landmark templates into the templates directory, then run `flipper check`.");
    Ok(())
}
