//! The flipping loop.
//!
//! One cycle: refresh the candidate list when it has gone stale, walk
//! the candidates placing buy orders, list whatever is sitting in the
//! inventory, sweep our standing orders for undercuts, then sleep a
//! randomized few minutes and go again. Flow failures reset the UI
//! and move on; only the client process disappearing ends the run.

use crate::config::{Blacklist, FlipperConfig, PriceSource};
use crate::decision::{plan_relisting, plan_trade, TradeParams};
use crate::machine::{is_fatal, MachineError, TradeMachine};
use crate::screens::{Screen, RESULT_ROWS};
use flipper_market::{
    remove_blacklisted, CandidateItem, Coins, ItemDetail, ListingClient, MarketError,
    MarketProvider, Transaction,
};
use flipper_vision::capture::ScreenCapture;
use flipper_vision::input::InputSimulator;
use flipper_vision::ocr::OcrEngine;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Inventory slots the sell phase will walk before giving up.
const MAX_SELL_SLOTS: usize = 16;

/// Errors from the orchestration layer.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error("Market data failed: {0}")]
    Market(#[from] MarketError),
}

/// Result type for orchestration.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

fn fatal(err: &OrchestratorError) -> bool {
    matches!(err, OrchestratorError::Machine(m) if is_fatal(m))
}

/// A buy order placed this run, remembered so the sell phase can
/// recognize the item once it lands in the inventory and price its
/// listing against what was actually paid.
#[derive(Debug, Clone)]
struct Purchase {
    item: CandidateItem,
    paid: i64,
}

/// Mutable state carried between cycles.
struct RunState {
    candidates: Vec<CandidateItem>,
    buy_index: usize,
    purchases: Vec<Purchase>,
    last_refresh: Option<tokio::time::Instant>,
    last_afk: tokio::time::Instant,
    cycles: u64,
}

impl RunState {
    fn new() -> Self {
        Self {
            candidates: Vec::new(),
            buy_index: 0,
            purchases: Vec::new(),
            last_refresh: None,
            last_afk: tokio::time::Instant::now(),
            cycles: 0,
        }
    }

    fn refresh_due(&self, cooldown: Duration) -> bool {
        match self.last_refresh {
            None => true,
            Some(at) => at.elapsed() >= cooldown,
        }
    }

    fn afk_due(&self, period: Duration) -> bool {
        self.last_afk.elapsed() >= period
    }
}

/// Whether our own orders already hold the front of the buy or the
/// sell queue for an item. Trading against our own order would only
/// bump its price for nothing.
fn own_order_flags(
    buys: &[Transaction],
    sells: &[Transaction],
    item_id: u64,
    best_buy: i64,
    best_sell: i64,
) -> (bool, bool) {
    let own_buy = buys
        .iter()
        .any(|o| o.item_id == item_id && o.price >= best_buy);
    let own_sell = sells
        .iter()
        .any(|o| o.item_id == item_id && o.price <= best_sell);
    (own_buy, own_sell)
}

/// Fold the catalog's authoritative name and rarity into a scraped
/// candidate. Listing pages occasionally truncate long names, which
/// would send the search after the wrong string.
fn refine_candidate(scraped: &CandidateItem, detail: &ItemDetail) -> CandidateItem {
    CandidateItem {
        name: detail.name.clone(),
        rarity: detail.rarity,
        ..scraped.clone()
    }
}

/// Rows of the transactions tab holding orders that have been
/// undercut, given each item's current best buy price.
fn undercut_rows(orders: &[Transaction], best_buy: &HashMap<u64, i64>) -> Vec<usize> {
    orders
        .iter()
        .take(RESULT_ROWS)
        .enumerate()
        .filter(|(_, order)| {
            best_buy
                .get(&order.item_id)
                .is_some_and(|best| order.price < *best)
        })
        .map(|(row, _)| row)
        .collect()
}

/// Runs the flipping loop against a trade machine and market sources.
pub struct Orchestrator<C, I, O, M> {
    machine: TradeMachine<C, I, O>,
    market: M,
    listing: ListingClient,
    config: FlipperConfig,
    blacklist: Blacklist,
    state: RunState,
}

impl<C, I, O, M> Orchestrator<C, I, O, M>
where
    C: ScreenCapture,
    I: InputSimulator,
    O: OcrEngine,
    M: MarketProvider,
{
    pub fn new(
        machine: TradeMachine<C, I, O>,
        market: M,
        listing: ListingClient,
        config: FlipperConfig,
        blacklist: Blacklist,
    ) -> Self {
        Self {
            machine,
            market,
            listing,
            config,
            blacklist,
            state: RunState::new(),
        }
    }

    /// Pull a fresh candidate list if the cooldown has passed. A
    /// failed fetch keeps the previous list.
    async fn refresh_candidates(&mut self) {
        if !self
            .state
            .refresh_due(self.config.timing.refresh_cooldown())
        {
            return;
        }
        match self
            .listing
            .fetch_candidates(&self.config.market.filter_params())
            .await
        {
            Ok(items) => {
                let before = items.len();
                let items =
                    remove_blacklisted(items, &self.blacklist.ids, &self.blacklist.names);
                info!(
                    kept = items.len(),
                    blacklisted = before - items.len(),
                    "candidate list refreshed"
                );
                self.state.candidates = items;
                self.state.buy_index = 0;
                self.state.last_refresh = Some(tokio::time::Instant::now());
            }
            Err(e) => warn!(error = %e, "candidate refresh failed, keeping old list"),
        }
    }

    /// The account's standing orders, or empty sets when no API key
    /// is configured.
    async fn open_orders(&self) -> OrchestratorResult<(Vec<Transaction>, Vec<Transaction>)> {
        if self.config.market.api_key.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        Ok((
            self.market.open_buy_orders().await?,
            self.market.open_sell_listings().await?,
        ))
    }

    /// Observed prices plus whether our own orders already sit at the
    /// front of either queue.
    async fn observe_prices(
        &self,
        item: &CandidateItem,
    ) -> OrchestratorResult<(i64, i64, bool, bool)> {
        let (buy, sell) = match self.config.market.price_source {
            PriceSource::Ocr => self.machine.read_item_prices().await?,
            PriceSource::Api => {
                let snapshot = self.market.prices(item.id).await?;
                (snapshot.highest_buy, snapshot.lowest_sell)
            }
        };
        let (buys, sells) = self.open_orders().await?;
        let (own_buy, own_sell) = own_order_flags(&buys, &sells, item.id, buy, sell);
        Ok((buy, sell, own_buy, own_sell))
    }

    /// Place buy orders for the next batch of candidates. The walk
    /// position survives across cycles; wrapping past the end of the
    /// list forces a refresh next cycle.
    async fn buy_phase(&mut self, params: &TradeParams) -> OrchestratorResult<()> {
        let candidates = self.state.candidates.clone();
        if candidates.is_empty() {
            return Ok(());
        }

        for _ in 0..self.config.trade.buys_per_cycle {
            if self.state.buy_index >= candidates.len() {
                self.state.buy_index = 0;
                self.state.last_refresh = None;
                break;
            }
            let item = &candidates[self.state.buy_index];
            self.state.buy_index += 1;

            let result = self.buy_one(item, params).await;
            match result {
                Ok(true) => info!(item = %item.name, "buy order placed"),
                Ok(false) => {}
                Err(e) if fatal(&e) => return Err(e),
                Err(e) => {
                    warn!(item = %item.name, error = %e, "buy flow failed, resetting ui");
                    self.recover().await?;
                }
            }
        }
        Ok(())
    }

    async fn buy_one(
        &mut self,
        item: &CandidateItem,
        params: &TradeParams,
    ) -> OrchestratorResult<bool> {
        // the catalog is authoritative on names; scraped rows can be
        // truncated, and a truncated name searches for the wrong item
        let item = match self.market.item(item.id).await {
            Ok(detail) => refine_candidate(item, &detail),
            Err(e) => {
                warn!(item = %item.name, error = %e, "catalog lookup failed, using listing data");
                item.clone()
            }
        };

        if !self.machine.search_item(&item.name, item.rarity).await? {
            info!(item = %item.name, "search found nothing, skipping");
            return Ok(false);
        }
        let row = self.machine.find_item_row(&item).await?;
        self.machine.open_row(row).await?;

        let (buy, sell, own_buy, own_sell) = self.observe_prices(&item).await?;
        let plan = plan_trade(&item, buy, sell, own_buy, own_sell, params);

        let placed = match plan {
            Some(plan) => {
                self.machine
                    .place_order(Coins(plan.buy_price), plan.quantity)
                    .await?;
                self.state.purchases.push(Purchase {
                    item: item.clone(),
                    paid: plan.buy_price,
                });
                true
            }
            None => {
                info!(item = %item.name, buy, sell, "no viable trade");
                false
            }
        };

        self.machine.close_item_window().await?;
        Ok(placed)
    }

    /// List bought inventory back on the market. Each occupied slot
    /// is matched to a recorded purchase by the item window's name,
    /// then priced through the decision engine against what was paid;
    /// anything unrecognized or unprofitable stays in the inventory
    /// for a later cycle.
    async fn sell_phase(&mut self, params: &TradeParams) -> OrchestratorResult<()> {
        if self.state.purchases.is_empty() {
            return Ok(());
        }
        self.machine.goto_screen(Screen::Sell).await?;
        let (_, own_sells) = self.open_orders().await?;

        for slot in 0..MAX_SELL_SLOTS {
            if !self.machine.open_sell_slot(slot).await? {
                // first empty slot ends the walk
                break;
            }

            let mut matched = None;
            for (index, purchase) in self.state.purchases.iter().enumerate() {
                if self
                    .machine
                    .item_window_shows(&purchase.item.name, purchase.item.rarity)
                    .await?
                {
                    matched = Some(index);
                    break;
                }
            }
            let Some(index) = matched else {
                warn!(slot, "slot matches no recorded purchase, holding");
                self.machine.close_item_window().await?;
                continue;
            };
            let purchase = self.state.purchases[index].clone();

            let (_, sell) = self.machine.read_item_prices().await?;
            let own_sell = own_sells
                .iter()
                .any(|o| o.item_id == purchase.item.id && o.price <= sell);

            match plan_relisting(&purchase.item, purchase.paid, sell, own_sell, params) {
                Some(ask) => {
                    self.machine.list_item(Coins(ask)).await?;
                    self.state.purchases.remove(index);
                    info!(item = %purchase.item.name, ask, "inventory item listed");
                }
                None => info!(item = %purchase.item.name, sell, "no viable ask, holding"),
            }
            self.machine.close_item_window().await?;
        }
        Ok(())
    }

    /// Cancel our standing buy orders that have been undercut. Needs
    /// an API key; silently skipped without one.
    async fn cancel_undercut_sweep(&mut self) -> OrchestratorResult<()> {
        if self.config.market.api_key.is_empty() {
            return Ok(());
        }

        let orders = self.market.open_buy_orders().await?;
        if orders.is_empty() {
            return Ok(());
        }

        let mut best_buy = HashMap::new();
        for order in orders.iter().take(RESULT_ROWS) {
            if let std::collections::hash_map::Entry::Vacant(entry) =
                best_buy.entry(order.item_id)
            {
                entry.insert(self.market.prices(order.item_id).await?.highest_buy);
            }
        }

        let rows = undercut_rows(&orders, &best_buy);
        info!(count = rows.len(), "cancelling undercut orders");
        // each cancellation shifts the rows below it up by one
        for (already_cancelled, row) in rows.into_iter().enumerate() {
            self.machine
                .cancel_transaction_row(row - already_cancelled)
                .await?;
        }
        Ok(())
    }

    /// Reset the UI after a failed flow, checking first whether the
    /// failure was really the window going away.
    async fn recover(&mut self) -> OrchestratorResult<()> {
        self.machine.refresh_window().await?;
        if let Err(e) = self.machine.reset_ui().await {
            if is_fatal(&e) {
                return Err(e.into());
            }
            warn!(error = %e, "ui reset failed");
        }
        Ok(())
    }

    /// One full cycle of the loop.
    pub async fn run_cycle(&mut self) -> OrchestratorResult<()> {
        self.state.cycles += 1;
        info!(cycle = self.state.cycles, "cycle start");

        self.machine.refresh_window().await?;
        self.machine.handle_map_prompt().await?;

        if self.state.afk_due(self.config.timing.anti_afk_period()) {
            self.machine.anti_afk().await?;
            self.state.last_afk = tokio::time::Instant::now();
        }

        self.refresh_candidates().await;

        self.machine.reset_ui().await?;
        self.machine.open_trading_post().await?;

        let params = self.config.trade.trade_params();
        self.buy_phase(&params).await?;
        self.sell_phase(&params).await?;
        self.cancel_undercut_sweep().await?;

        self.machine.reset_ui().await?;

        let mismatch_log = self.config.paths.mismatch_log_path();
        if let Err(e) = self.machine.verifier_mut().save_mismatches(&mismatch_log) {
            warn!(error = %e, "failed to persist mismatch log");
        }
        Ok(())
    }

    /// Randomized pause between cycles.
    fn cycle_sleep(&self) -> Duration {
        let min = self.config.timing.cycle_min_secs;
        let max = self.config.timing.cycle_max_secs.max(min);
        let secs = rand::thread_rng().gen_range(min..=max);
        Duration::from_secs(secs)
    }

    /// Run until the client goes away or the task is cancelled.
    pub async fn run(&mut self) -> OrchestratorResult<()> {
        loop {
            match self.run_cycle().await {
                Ok(()) => {}
                Err(e) if fatal(&e) => {
                    error!(error = %e, "client gone, stopping");
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "cycle failed, recovering");
                    self.recover().await?;
                }
            }
            let pause = self.cycle_sleep();
            info!(secs = pause.as_secs(), "sleeping until next cycle");
            tokio::time::sleep(pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flipper_market::Rarity;

    fn tx(id: u64, item_id: u64, price: i64) -> Transaction {
        Transaction {
            id,
            item_id,
            price,
            quantity: 1,
            created: Utc::now(),
        }
    }

    #[test]
    fn own_order_flags_detect_the_queue_front() {
        let buys = vec![tx(1, 10, 500)];
        let sells = vec![tx(2, 10, 800)];

        // our order matches the best bid, our listing sits at the ask
        assert_eq!(own_order_flags(&buys, &sells, 10, 500, 800), (true, true));
        // beaten on both sides
        assert_eq!(own_order_flags(&buys, &sells, 10, 501, 799), (false, false));
        // a different item entirely
        assert_eq!(own_order_flags(&buys, &sells, 11, 500, 800), (false, false));
        // no orders at all
        assert_eq!(own_order_flags(&[], &[], 10, 500, 800), (false, false));
    }

    #[test]
    fn catalog_detail_overrides_scraped_name_and_rarity() {
        let scraped = CandidateItem {
            id: 19721,
            name: "Glob of Ectopl".to_string(),
            rarity: Rarity::Fine,
            buy_price: 2500,
            sell_price: 3000,
            sold_daily: 4800,
            profit: 50,
        };
        let detail = ItemDetail {
            id: 19721,
            name: "Glob of Ectoplasm".to_string(),
            rarity: Rarity::Exotic,
            level: 0,
        };

        let refined = refine_candidate(&scraped, &detail);
        assert_eq!(refined.name, "Glob of Ectoplasm");
        assert_eq!(refined.rarity, Rarity::Exotic);
        // market figures stay with the listing's estimate
        assert_eq!(refined.buy_price, 2500);
        assert_eq!(refined.profit, 50);
    }

    #[test]
    fn undercut_rows_flags_only_beaten_orders() {
        let orders = vec![tx(1, 10, 500), tx(2, 20, 300), tx(3, 30, 900)];
        let best: HashMap<u64, i64> = [(10, 500), (20, 350), (30, 1000)].into_iter().collect();

        // order 1 still matches the best price, orders 2 and 3 are beaten
        assert_eq!(undercut_rows(&orders, &best), vec![1, 2]);
    }

    #[test]
    fn undercut_rows_ignores_rows_off_screen() {
        let orders: Vec<Transaction> = (0..10).map(|i| tx(i, i, 100)).collect();
        let best: HashMap<u64, i64> = (0..10u64).map(|i| (i, 200)).collect();

        let rows = undercut_rows(&orders, &best);
        assert_eq!(rows.len(), RESULT_ROWS);
        assert_eq!(*rows.last().unwrap(), RESULT_ROWS - 1);
    }

    #[test]
    fn undercut_rows_skips_unknown_items() {
        let orders = vec![tx(1, 10, 500)];
        assert!(undercut_rows(&orders, &HashMap::new()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_due_initially_and_after_cooldown() {
        let mut state = RunState::new();
        let cooldown = Duration::from_secs(900);
        assert!(state.refresh_due(cooldown));

        state.last_refresh = Some(tokio::time::Instant::now());
        assert!(!state.refresh_due(cooldown));

        tokio::time::advance(Duration::from_secs(901)).await;
        assert!(state.refresh_due(cooldown));
    }

    #[tokio::test(start_paused = true)]
    async fn afk_nudge_is_periodic() {
        let state = RunState::new();
        let period = Duration::from_secs(1800);
        assert!(!state.afk_due(period));
        tokio::time::advance(Duration::from_secs(1800)).await;
        assert!(state.afk_due(period));
    }
}
