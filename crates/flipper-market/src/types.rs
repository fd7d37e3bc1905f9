//! Core market data types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Item rarity tiers, ordered from lowest to highest.
///
/// The ordering matters twice: the ranked listing can be filtered to a
/// rarity band, and the in-game search panel lays its rarity filter
/// buttons out in this order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Rarity {
    Junk,
    #[default]
    Basic,
    Fine,
    Masterwork,
    Rare,
    Exotic,
    Ascended,
    Legendary,
}

impl Rarity {
    /// All rarities in filter-panel order.
    pub const ALL: [Rarity; 8] = [
        Rarity::Junk,
        Rarity::Basic,
        Rarity::Fine,
        Rarity::Masterwork,
        Rarity::Rare,
        Rarity::Exotic,
        Rarity::Ascended,
        Rarity::Legendary,
    ];

    /// Zero-based position in the search panel's rarity filter list.
    pub fn filter_index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|r| r == self)
            .unwrap_or_default()
    }

    /// The RGB color item names render in at this rarity. Name OCR
    /// binarizes against this color.
    pub fn name_color(&self) -> [u8; 3] {
        match self {
            Rarity::Junk => [170, 170, 170],
            Rarity::Basic => [255, 255, 255],
            Rarity::Fine => [98, 164, 218],
            Rarity::Masterwork => [26, 147, 6],
            Rarity::Rare => [252, 208, 11],
            Rarity::Exotic => [255, 164, 5],
            Rarity::Ascended => [251, 62, 141],
            Rarity::Legendary => [153, 53, 216],
        }
    }

    /// Parse the rarity names the API and the listing site use.
    pub fn parse(s: &str) -> Option<Rarity> {
        match s.trim().to_ascii_lowercase().as_str() {
            "junk" => Some(Rarity::Junk),
            "basic" => Some(Rarity::Basic),
            "fine" => Some(Rarity::Fine),
            "masterwork" => Some(Rarity::Masterwork),
            "rare" => Some(Rarity::Rare),
            "exotic" => Some(Rarity::Exotic),
            "ascended" => Some(Rarity::Ascended),
            "legendary" => Some(Rarity::Legendary),
            _ => None,
        }
    }
}

/// An amount of coin in copper.
///
/// Prices travel as plain copper everywhere; this wrapper only exists
/// for display and for assembling a price out of the three on-screen
/// denomination fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Coins(pub i64);

impl Coins {
    /// Assemble from the gold/silver/copper fields of a price widget.
    pub fn from_denominations(gold: i64, silver: i64, copper: i64) -> Self {
        Coins(gold * 10_000 + silver * 100 + copper)
    }

    pub fn gold(&self) -> i64 {
        self.0 / 10_000
    }

    pub fn silver(&self) -> i64 {
        (self.0 / 100) % 100
    }

    pub fn copper(&self) -> i64 {
        self.0 % 100
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}g {}s {}c",
            self.gold(),
            self.silver(),
            self.copper()
        )
    }
}

/// Static details of an item, from the items endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetail {
    pub id: u64,
    pub name: String,
    pub rarity: Rarity,
    #[serde(default)]
    pub level: u32,
}

/// Current best prices for an item, from the prices endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub item_id: u64,
    /// Highest standing buy order, in copper
    pub highest_buy: i64,
    /// Lowest standing sell listing, in copper
    pub lowest_sell: i64,
}

/// One of the player's own standing orders, from the transactions
/// endpoint (either side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub item_id: u64,
    /// Unit price in copper
    pub price: i64,
    pub quantity: u32,
    pub created: chrono::DateTime<chrono::Utc>,
}

/// A flip candidate pulled from the ranked listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: u64,
    pub name: String,
    pub rarity: Rarity,
    /// Expected buy-in price (highest buy order), in copper
    pub buy_price: i64,
    /// Expected sell-out price (lowest sell listing), in copper
    pub sell_price: i64,
    /// Units sold per day, the listing's demand estimate
    pub sold_daily: u32,
    /// The listing's own after-fee profit estimate, in copper
    pub profit: i64,
}

/// Query constraints for the ranked listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterParams {
    /// Minimum after-fee profit per unit, in copper
    pub min_profit: i64,
    /// Minimum units sold per day
    pub min_sold: u32,
    /// Buy-in price bounds, in copper
    pub min_buy_price: i64,
    pub max_buy_price: i64,
    /// Inclusive rarity band
    pub min_rarity: Rarity,
    pub max_rarity: Rarity,
    /// Number of listing pages to pull
    pub pages: u32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            min_profit: 100,
            min_sold: 50,
            min_buy_price: 100,
            max_buy_price: 100_000,
            min_rarity: Rarity::Junk,
            max_rarity: Rarity::Legendary,
            pages: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coins_from_denominations() {
        assert_eq!(Coins::from_denominations(2, 34, 56), Coins(23456));
        assert_eq!(Coins::from_denominations(0, 0, 99), Coins(99));
    }

    #[test]
    fn coins_display_breaks_down() {
        assert_eq!(Coins(23456).to_string(), "2g 34s 56c");
        assert_eq!(Coins(7).to_string(), "0g 0s 7c");
    }

    #[test]
    fn rarity_ordering_matches_filter_layout() {
        assert!(Rarity::Junk < Rarity::Exotic);
        assert_eq!(Rarity::Junk.filter_index(), 0);
        assert_eq!(Rarity::Legendary.filter_index(), 7);
    }

    #[test]
    fn rarity_parses_case_insensitively() {
        assert_eq!(Rarity::parse("Exotic"), Some(Rarity::Exotic));
        assert_eq!(Rarity::parse("masterwork"), Some(Rarity::Masterwork));
        assert_eq!(Rarity::parse("mythic"), None);
    }
}
