//! Ranked flip-candidate listing.
//!
//! Candidates come from a community listing site that ranks items by
//! flip profit. There is no JSON API for the ranking, so pages are
//! fetched as HTML and scraped: one table row per item carrying the
//! item id, name, rarity, both prices and the daily sales volume.

use crate::error::{MarketError, MarketResult};
use crate::types::{CandidateItem, FilterParams, Rarity};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Default listing site root.
pub const DEFAULT_LISTING_BASE: &str = "https://www.gw2bltc.com/en/tp/search";

/// Client for the ranked listing site.
pub struct ListingClient {
    client: Client,
    base_url: String,
}

impl ListingClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_LISTING_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch the ranked listing, page by page, merged by item id and
    /// sorted by the listing's profit estimate, best first. When an
    /// item shows up on more than one page the ranking shifted while
    /// we paged through it; the later row is the fresher one and
    /// replaces the earlier.
    pub async fn fetch_candidates(
        &self,
        params: &FilterParams,
    ) -> MarketResult<Vec<CandidateItem>> {
        let mut merged: Vec<CandidateItem> = Vec::new();
        let mut seen: HashMap<u64, usize> = HashMap::new();

        for page in 1..=params.pages.max(1) {
            let response = self
                .client
                .get(&self.base_url)
                .query(&[
                    ("sort", "profit".to_string()),
                    ("profit-min", params.min_profit.to_string()),
                    ("sold-day-min", params.min_sold.to_string()),
                    ("buy-min", params.min_buy_price.to_string()),
                    ("buy-max", params.max_buy_price.to_string()),
                    ("rarity-min", params.min_rarity.filter_index().to_string()),
                    ("rarity-max", params.max_rarity.filter_index().to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(MarketError::Api {
                    status: status.as_u16(),
                    body: format!("listing page {}", page),
                });
            }

            let html = response.text().await?;
            let items = parse_listing_page(&html)?;
            debug!(page, count = items.len(), "parsed listing page");
            // an empty page means the filters ran out of results
            if items.is_empty() {
                break;
            }
            for item in items {
                match seen.entry(item.id) {
                    Entry::Occupied(slot) => merged[*slot.get()] = item,
                    Entry::Vacant(slot) => {
                        slot.insert(merged.len());
                        merged.push(item);
                    }
                }
            }
        }

        merged.sort_by(|a, b| b.profit.cmp(&a.profit));
        info!(count = merged.len(), "fetched flip candidates");
        Ok(merged)
    }
}

impl Default for ListingClient {
    fn default() -> Self {
        Self::new()
    }
}

fn selector(css: &str) -> MarketResult<Selector> {
    Selector::parse(css).map_err(|e| MarketError::ListingParse(format!("bad selector: {}", e)))
}

fn cell_number(row: &scraper::ElementRef<'_>, sel: &Selector) -> i64 {
    row.select(sel)
        .next()
        .map(|cell| {
            let text: String = cell
                .text()
                .collect::<String>()
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            text.parse().unwrap_or(0)
        })
        .unwrap_or(0)
}

/// Parse one listing page into candidates. Rows missing an item link
/// are skipped rather than failing the whole page.
pub fn parse_listing_page(html: &str) -> MarketResult<Vec<CandidateItem>> {
    let document = Html::parse_document(html);
    let row_sel = selector("table tbody tr")?;
    let name_sel = selector("td.td-name a")?;
    let buy_sel = selector("td.td-buy")?;
    let sell_sel = selector("td.td-sell")?;
    let profit_sel = selector("td.td-profit")?;
    let sold_sel = selector("td.td-sold")?;

    let mut items = Vec::new();
    for row in document.select(&row_sel) {
        let Some(link) = row.select(&name_sel).next() else {
            continue;
        };

        // hrefs look like /en/item/19721-glob-of-ectoplasm
        let Some(id) = link
            .value()
            .attr("href")
            .and_then(|href| href.rsplit('/').next())
            .and_then(|slug| {
                let digits: String = slug.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse::<u64>().ok()
            })
        else {
            continue;
        };

        let name = link.text().collect::<String>().trim().to_string();
        if name.is_empty() {
            continue;
        }

        // rarity rides on the link's class list, e.g. "rarity-Exotic"
        let rarity = link
            .value()
            .classes()
            .find_map(|c| c.strip_prefix("rarity-"))
            .and_then(Rarity::parse)
            .unwrap_or_default();

        items.push(CandidateItem {
            id,
            name,
            rarity,
            buy_price: cell_number(&row, &buy_sel),
            sell_price: cell_number(&row, &sell_sel),
            sold_daily: cell_number(&row, &sold_sel) as u32,
            profit: cell_number(&row, &profit_sel),
        });
    }

    Ok(items)
}

/// Drop blacklisted candidates, matched by id or case-insensitive
/// name.
pub fn remove_blacklisted(
    items: Vec<CandidateItem>,
    ids: &HashSet<u64>,
    names: &HashSet<String>,
) -> Vec<CandidateItem> {
    let lowered: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
    items
        .into_iter()
        .filter(|item| !ids.contains(&item.id) && !lowered.contains(&item.name.to_lowercase()))
        .collect()
}
