//! Trade decision engine.
//!
//! Pure arithmetic, no IO: given what the listing promised and what
//! the screen actually shows, decide whether to trade, at which
//! prices, and in what quantity. Everything here is deterministic and
//! tested directly.

use flipper_market::CandidateItem;
use serde::{Deserialize, Serialize};

/// Hard cap on units per order, matching the trading post's own limit.
pub const MAX_ORDER_QUANTITY: u32 = 250;

/// Tunables for trade planning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeParams {
    /// Maximum coin committed to a single buy order, in copper
    pub max_spend: i64,
    /// Fraction of daily sales volume we are willing to absorb
    pub quantity_fraction: f64,
    /// Plausibility factor in (0, 1]: observed prices must fall in
    /// `[expected * error_range, expected * (2 - error_range)]`
    pub error_range: f64,
    /// Fraction of the listing's promised profit we insist on
    pub profit_range: f64,
    /// Listing fee rate charged when a sale is posted
    pub listing_fee_rate: f64,
    /// Exchange fee rate charged when a sale completes
    pub exchange_fee_rate: f64,
}

impl Default for TradeParams {
    fn default() -> Self {
        Self {
            max_spend: 50_000,
            quantity_fraction: 0.1,
            error_range: 0.8,
            profit_range: 0.75,
            listing_fee_rate: 0.05,
            exchange_fee_rate: 0.10,
        }
    }
}

/// A fully priced trade, ready for the state machine to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradePlan {
    /// Unit price for the buy order, in copper
    pub buy_price: i64,
    /// Unit price for the later sell listing, in copper
    pub sell_price: i64,
    /// Units to order
    pub quantity: u32,
    /// After-fee profit per unit, in copper
    pub unit_profit: i64,
}

/// Combined trading post fees on a sale: the listing fee and the
/// exchange fee, each rounded up and at least 1 copper.
pub fn sale_fees(sell_price: i64, params: &TradeParams) -> i64 {
    let listing = ((sell_price as f64 * params.listing_fee_rate).ceil() as i64).max(1);
    let exchange = ((sell_price as f64 * params.exchange_fee_rate).ceil() as i64).max(1);
    listing + exchange
}

/// After-fee profit of buying at `buy_price` and selling at
/// `sell_price`.
pub fn net_profit(buy_price: i64, sell_price: i64, params: &TradeParams) -> i64 {
    sell_price - buy_price - sale_fees(sell_price, params)
}

/// Whether an observed price sits inside the plausibility band around
/// the expected one. Guards against OCR misreads and stale listings.
pub fn price_plausible(observed: i64, expected: i64, error_range: f64) -> bool {
    if observed <= 0 || expected <= 0 {
        return false;
    }
    let low = expected as f64 * error_range;
    let high = expected as f64 * (2.0 - error_range);
    (observed as f64) >= low && (observed as f64) <= high
}

/// Price for a new buy order: one copper over the current best, or
/// matching it when the best order is already ours.
pub fn undercut_buy(highest_buy: i64, own_best: bool) -> i64 {
    if own_best {
        highest_buy
    } else {
        highest_buy + 1
    }
}

/// Price for a new sell listing: one copper under the current best,
/// or matching it when the best listing is already ours.
pub fn undercut_sell(lowest_sell: i64, own_best: bool) -> i64 {
    if own_best {
        lowest_sell
    } else {
        lowest_sell - 1
    }
}

/// How many units to order: bounded by spend, by a fraction of daily
/// volume, and by the order cap. Never less than one.
pub fn purchase_quantity(
    max_spend: i64,
    unit_buy: i64,
    sold_daily: u32,
    quantity_fraction: f64,
) -> u32 {
    if unit_buy <= 0 {
        return 1;
    }
    let by_spend = (max_spend / unit_buy).max(0) as u32;
    let by_volume = (sold_daily as f64 * quantity_fraction).floor() as u32;
    by_spend.min(by_volume).min(MAX_ORDER_QUANTITY).max(1)
}

/// Smallest sell price whose after-fee profit over `buy_price` meets
/// `floor`.
fn sell_price_for_profit(buy_price: i64, floor: i64, params: &TradeParams) -> i64 {
    // the linear fee total lands at or slightly below the answer
    // because the per-fee ceilings only push upward; walk the rest
    let keep = 1.0 - params.listing_fee_rate - params.exchange_fee_rate;
    let mut sell = (((buy_price + floor) as f64) / keep).floor() as i64;
    while net_profit(buy_price, sell, params) < floor {
        sell += 1;
    }
    sell
}

/// Decide whether to flip a candidate given the prices observed on
/// screen.
///
/// Returns `None` when the observed prices are implausible against
/// the listing's expectation, or when no sell price inside the
/// plausibility band clears the profit floor.
pub fn plan_trade(
    candidate: &CandidateItem,
    observed_buy: i64,
    observed_sell: i64,
    own_best_buy: bool,
    own_best_sell: bool,
    params: &TradeParams,
) -> Option<TradePlan> {
    let buy_ok = price_plausible(observed_buy, candidate.buy_price, params.error_range);
    let sell_ok = price_plausible(observed_sell, candidate.sell_price, params.error_range);
    // one misread side is tolerable, two means we are not looking at
    // the item we think we are
    if !buy_ok && !sell_ok {
        return None;
    }

    let buy_price = undercut_buy(observed_buy, own_best_buy);
    let mut sell_price = undercut_sell(observed_sell, own_best_sell);
    if sell_price <= buy_price {
        return None;
    }

    let floor = ((candidate.profit as f64) * params.profit_range).ceil() as i64;
    let mut unit_profit = net_profit(buy_price, sell_price, params);

    if unit_profit < floor {
        // undercutting is not worth it; ask for the floor instead, as
        // long as that price is still believable for this item
        let needed = sell_price_for_profit(buy_price, floor, params);
        let ceiling = (candidate.sell_price as f64 * (2.0 - params.error_range)).floor() as i64;
        if needed > ceiling {
            return None;
        }
        sell_price = needed;
        unit_profit = net_profit(buy_price, sell_price, params);
    }

    if buy_price > params.max_spend {
        return None;
    }

    let quantity = purchase_quantity(
        params.max_spend,
        buy_price,
        candidate.sold_daily,
        params.quantity_fraction,
    );

    Some(TradePlan {
        buy_price,
        sell_price,
        quantity,
        unit_profit,
    })
}

/// Price a sell listing for an item already bought. The sell-side
/// mirror of [`plan_trade`]: undercut the current cheapest listing,
/// lift the ask when plain undercutting would give away the profit
/// floor, and refuse to list at all when the observed price or the
/// needed ask leaves the plausibility band.
///
/// `paid` is the unit price the item was actually bought at. Returns
/// the ask, or `None` to hold the item for a later cycle.
pub fn plan_relisting(
    candidate: &CandidateItem,
    paid: i64,
    observed_sell: i64,
    own_best_sell: bool,
    params: &TradeParams,
) -> Option<i64> {
    if !price_plausible(observed_sell, candidate.sell_price, params.error_range) {
        return None;
    }

    let mut ask = undercut_sell(observed_sell, own_best_sell);
    if ask <= paid {
        return None;
    }

    let floor = ((candidate.profit as f64) * params.profit_range).ceil() as i64;
    if net_profit(paid, ask, params) < floor {
        let needed = sell_price_for_profit(paid, floor, params);
        let ceiling = (candidate.sell_price as f64 * (2.0 - params.error_range)).floor() as i64;
        if needed > ceiling {
            return None;
        }
        ask = needed;
    }
    Some(ask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipper_market::Rarity;

    fn candidate(buy: i64, sell: i64, sold: u32) -> CandidateItem {
        CandidateItem {
            id: 1,
            name: "Test Item".to_string(),
            rarity: Rarity::Fine,
            buy_price: buy,
            sell_price: sell,
            sold_daily: sold,
            profit: net_profit(buy, sell, &TradeParams::default()),
        }
    }

    #[test]
    fn fees_round_up_with_one_copper_minimum() {
        let params = TradeParams::default();
        // 5% of 10 is 0.5 -> 1; 10% of 10 is 1 -> 1
        assert_eq!(sale_fees(10, &params), 2);
        // tiny sales still pay 1 + 1
        assert_eq!(sale_fees(1, &params), 2);
        // 5% of 1000 = 50, 10% = 100
        assert_eq!(sale_fees(1000, &params), 150);
        // 101: 5.05 -> 6, 10.1 -> 11
        assert_eq!(sale_fees(101, &params), 17);
    }

    #[test]
    fn fee_rates_are_tunable() {
        let params = TradeParams {
            listing_fee_rate: 0.02,
            exchange_fee_rate: 0.03,
            ..TradeParams::default()
        };
        // 2% of 1000 = 20, 3% = 30
        assert_eq!(sale_fees(1000, &params), 50);
        assert_eq!(net_profit(500, 1000, &params), 1000 - 500 - 50);
    }

    #[test]
    fn net_profit_subtracts_both_fees() {
        let params = TradeParams::default();
        assert_eq!(net_profit(500, 1000, &params), 1000 - 500 - 150);
        assert!(net_profit(900, 1000, &params) < 0);
    }

    #[test]
    fn profit_rises_with_sell_price_beyond_fee_jitter() {
        let params = TradeParams::default();
        // a one-copper raise can be eaten when both fee ceilings jump
        // on the same step, so pointwise the profit may dip by one
        let mut last = net_profit(100, 101, &params);
        for sell in 102..400 {
            let p = net_profit(100, sell, &params);
            assert!(p >= last - 1);
            last = p;
        }
        // across a full fee period the trend is strictly upward
        for sell in (120..380).step_by(20) {
            assert!(net_profit(100, sell + 20, &params) > net_profit(100, sell, &params));
        }
    }

    #[test]
    fn plausibility_band_is_symmetric_around_expected() {
        // er = 0.8 -> band [800, 1200]
        assert!(price_plausible(800, 1000, 0.8));
        assert!(price_plausible(1200, 1000, 0.8));
        assert!(!price_plausible(799, 1000, 0.8));
        assert!(!price_plausible(1201, 1000, 0.8));
        assert!(!price_plausible(0, 1000, 0.8));
    }

    #[test]
    fn undercut_steps_one_copper_unless_own() {
        assert_eq!(undercut_buy(2500, false), 2501);
        assert_eq!(undercut_buy(2500, true), 2500);
        assert_eq!(undercut_sell(3000, false), 2999);
        assert_eq!(undercut_sell(3000, true), 3000);
    }

    #[test]
    fn quantity_respects_all_three_bounds() {
        // spend-bound: 1000 / 100 = 10
        assert_eq!(purchase_quantity(1000, 100, 10_000, 0.5), 10);
        // volume-bound: 200 * 0.1 = 20
        assert_eq!(purchase_quantity(1_000_000, 100, 200, 0.1), 20);
        // cap-bound
        assert_eq!(purchase_quantity(10_000_000, 100, 100_000, 0.5), 250);
        // never zero
        assert_eq!(purchase_quantity(50, 100, 0, 0.1), 1);
    }

    #[test]
    fn plan_accepts_plausible_prices_and_undercuts() {
        let cand = candidate(2500, 3000, 4800);
        let params = TradeParams::default();
        let plan = plan_trade(&cand, 2500, 3000, false, false, &params).unwrap();
        assert_eq!(plan.buy_price, 2501);
        assert_eq!(plan.sell_price, 2999);
        assert_eq!(plan.unit_profit, net_profit(2501, 2999, &params));
        assert!(plan.quantity >= 1 && plan.quantity <= MAX_ORDER_QUANTITY);
    }

    #[test]
    fn plan_rejects_when_both_prices_implausible() {
        let cand = candidate(2500, 3000, 4800);
        let params = TradeParams::default();
        // both observed prices wildly off the listing
        assert!(plan_trade(&cand, 100, 90_000, false, false, &params).is_none());
    }

    #[test]
    fn plan_tolerates_one_implausible_side() {
        let cand = candidate(2500, 3000, 4800);
        let params = TradeParams::default();
        // sell side misread but buy side fine
        let plan = plan_trade(&cand, 2500, 3700, false, false, &params);
        assert!(plan.is_some());
    }

    #[test]
    fn plan_raises_ask_to_meet_profit_floor() {
        // market moved: sell side collapsed toward the buy side
        let cand = candidate(2500, 3600, 4800);
        let params = TradeParams {
            error_range: 0.7,
            profit_range: 0.9,
            ..TradeParams::default()
        };
        let plan = plan_trade(&cand, 2500, 2700, false, false, &params).unwrap();
        let floor = ((cand.profit as f64) * params.profit_range).ceil() as i64;
        // not the plain undercut: the ask was lifted to clear the floor
        assert!(plan.sell_price > 2699);
        assert!(plan.unit_profit >= floor);
        // and stayed inside the believable band
        assert!(plan.sell_price as f64 <= cand.sell_price as f64 * (2.0 - params.error_range));
    }

    #[test]
    fn plan_rejects_when_floor_needs_unbelievable_ask() {
        // stale listing promising far more profit than the spread holds
        let mut cand = candidate(2500, 3000, 4800);
        cand.profit = 5000;
        let params = TradeParams::default();
        assert!(plan_trade(&cand, 2500, 3000, false, false, &params).is_none());
    }

    #[test]
    fn plan_rejects_inverted_market() {
        let cand = candidate(3000, 3100, 4800);
        let params = TradeParams::default();
        assert!(plan_trade(&cand, 3100, 3000, false, false, &params).is_none());
    }

    #[test]
    fn sell_price_for_profit_is_tight() {
        let params = TradeParams::default();
        let floor = 100;
        let sell = sell_price_for_profit(1000, floor, &params);
        assert!(net_profit(1000, sell, &params) >= floor);
        assert!(net_profit(1000, sell - 1, &params) < floor);
    }

    #[test]
    fn relisting_undercuts_when_profit_holds() {
        let cand = candidate(2500, 3000, 4800);
        let params = TradeParams::default();
        // bought at the planned price, market unchanged
        let ask = plan_relisting(&cand, 2501, 3000, false, &params).unwrap();
        assert_eq!(ask, 2999);
    }

    #[test]
    fn relisting_keeps_price_when_own_listing_is_best() {
        let cand = candidate(2500, 3000, 4800);
        let params = TradeParams::default();
        let ask = plan_relisting(&cand, 2501, 3000, true, &params).unwrap();
        assert_eq!(ask, 3000);
    }

    #[test]
    fn relisting_lifts_ask_to_the_profit_floor() {
        let cand = candidate(2500, 3600, 4800);
        let params = TradeParams {
            error_range: 0.7,
            profit_range: 0.9,
            ..TradeParams::default()
        };
        // cheapest listing collapsed toward what we paid
        let ask = plan_relisting(&cand, 2501, 2700, false, &params).unwrap();
        let floor = ((cand.profit as f64) * params.profit_range).ceil() as i64;
        assert!(ask > 2699);
        assert!(net_profit(2501, ask, &params) >= floor);
    }

    #[test]
    fn relisting_holds_on_implausible_observation() {
        let cand = candidate(2500, 3000, 4800);
        let params = TradeParams::default();
        // OCR misread, way off the expected sell price
        assert!(plan_relisting(&cand, 2501, 90_000, false, &params).is_none());
        // market collapsed below what we paid, and the floor cannot
        // be met inside the band
        let mut stale = candidate(2500, 3000, 4800);
        stale.profit = 5000;
        assert!(plan_relisting(&stale, 2501, 3000, false, &params).is_none());
    }
}
