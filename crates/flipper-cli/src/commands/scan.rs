//! # Scan Command
//!
//! Fetch the current candidate list and print it. Purely network, no
//! game client needed.

use crate::cli::Cli;
use colored::Colorize;
use flipper_core::Blacklist;
use flipper_market::{remove_blacklisted, Coins, ListingClient};

/// Run the scan command
pub async fn run(cli: &Cli, limit: usize) -> anyhow::Result<()> {
    let config = super::load_config(cli)?;
    let blacklist = Blacklist::load(config.paths.blacklist_path())?;

    let listing = ListingClient::with_base_url(&config.market.listing_base);
    let candidates = listing.fetch_candidates(&config.market.filter_params()).await?;
    let candidates = remove_blacklisted(candidates, &blacklist.ids, &blacklist.names);

    if candidates.is_empty() {
        println!("{} No candidates matched the filter.", "!".yellow());
        return Ok(());
    }

    println!(
        "{:>8}  {:<40} {:>12} {:>12} {:>12} {:>8}",
        "id", "name", "buy", "sell", "profit", "sold/d"
    );
    for item in candidates.iter().take(limit) {
        println!(
            "{:>8}  {:<40} {:>12} {:>12} {:>12} {:>8}",
            item.id,
            item.name,
            Coins(item.buy_price).to_string(),
            Coins(item.sell_price).to_string(),
            Coins(item.profit).to_string().green(),
            item.sold_daily
        );
    }
    if candidates.len() > limit {
        println!("... and {} more", candidates.len() - limit);
    }
    Ok(())
}
