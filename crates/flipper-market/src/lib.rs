//! # Flipper Market
//!
//! Market data for the trading-post flipper.
//!
//! Two independent sources feed the bot:
//!
//! - the **ranked listing** ([`listing`]), a community site scraped
//!   for flip candidates ordered by estimated profit
//! - the **trading post API** ([`catalog`]), a typed REST client for
//!   item details, live prices and the account's open orders
//!
//! Both sit behind traits/pure functions so the decision and
//! orchestration layers can be tested without the network.

pub mod catalog;
pub mod error;
pub mod listing;
pub mod types;

// Re-export main types
pub use catalog::{ApiProvider, MarketProvider, DEFAULT_API_BASE};
pub use error::{MarketError, MarketResult};
pub use listing::{parse_listing_page, remove_blacklisted, ListingClient, DEFAULT_LISTING_BASE};
pub use types::{
    CandidateItem, Coins, FilterParams, ItemDetail, PriceSnapshot, Rarity, Transaction,
};
