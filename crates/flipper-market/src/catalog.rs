//! Trading post API client.
//!
//! Thin typed client over the public trading post REST API: item
//! details, current best prices, and (given an API key) the account's
//! own standing orders. The OCR path is the primary price source in
//! the flipper; this client backs the API price mode and the
//! cancel-undercut sweep.

use crate::error::{MarketError, MarketResult};
use crate::types::{ItemDetail, PriceSnapshot, Rarity, Transaction};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Default public API root.
pub const DEFAULT_API_BASE: &str = "https://api.guildwars2.com/v2";

/// Source of item details, prices and the account's open orders.
#[async_trait]
pub trait MarketProvider: Send + Sync {
    /// Static details for one item.
    async fn item(&self, id: u64) -> MarketResult<ItemDetail>;

    /// Current best buy/sell prices for one item.
    async fn prices(&self, id: u64) -> MarketResult<PriceSnapshot>;

    /// The account's standing buy orders. Requires an API key.
    async fn open_buy_orders(&self) -> MarketResult<Vec<Transaction>>;

    /// The account's standing sell listings. Requires an API key.
    async fn open_sell_listings(&self) -> MarketResult<Vec<Transaction>>;
}

// Wire formats.

#[derive(Debug, Deserialize)]
struct WireItem {
    id: u64,
    name: String,
    rarity: String,
    #[serde(default)]
    level: u32,
}

#[derive(Debug, Deserialize)]
struct WireOrderBookSide {
    unit_price: i64,
}

#[derive(Debug, Deserialize)]
struct WirePrices {
    id: u64,
    buys: WireOrderBookSide,
    sells: WireOrderBookSide,
}

#[derive(Debug, Deserialize)]
struct WireTransaction {
    id: u64,
    item_id: u64,
    price: i64,
    quantity: u32,
    created: chrono::DateTime<chrono::Utc>,
}

impl From<WireTransaction> for Transaction {
    fn from(w: WireTransaction) -> Self {
        Transaction {
            id: w.id,
            item_id: w.item_id,
            price: w.price,
            quantity: w.quantity,
            created: w.created,
        }
    }
}

/// REST-backed market provider.
pub struct ApiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ApiProvider {
    /// Create a provider against the public API.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    /// Create a provider against a specific API root.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Attach the account API key needed for transaction endpoints.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.is_empty() {
            self.api_key = Some(key);
        }
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        authenticated: bool,
    ) -> MarketResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url);
        if authenticated {
            let key = self
                .api_key
                .as_deref()
                .ok_or(MarketError::AuthRequired("transaction endpoints"))?;
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!(url, "market api request ok");
        Ok(response.json().await?)
    }
}

impl Default for ApiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketProvider for ApiProvider {
    async fn item(&self, id: u64) -> MarketResult<ItemDetail> {
        let wire: WireItem = self.get_json(&format!("/items/{}", id), false).await?;
        Ok(ItemDetail {
            id: wire.id,
            name: wire.name,
            rarity: Rarity::parse(&wire.rarity).unwrap_or_default(),
            level: wire.level,
        })
    }

    async fn prices(&self, id: u64) -> MarketResult<PriceSnapshot> {
        let wire: WirePrices = self
            .get_json(&format!("/commerce/prices/{}", id), false)
            .await?;
        Ok(PriceSnapshot {
            item_id: wire.id,
            highest_buy: wire.buys.unit_price,
            lowest_sell: wire.sells.unit_price,
        })
    }

    async fn open_buy_orders(&self) -> MarketResult<Vec<Transaction>> {
        let wire: Vec<WireTransaction> = self
            .get_json("/commerce/transactions/current/buys", true)
            .await?;
        Ok(wire.into_iter().map(Transaction::from).collect())
    }

    async fn open_sell_listings(&self) -> MarketResult<Vec<Transaction>> {
        let wire: Vec<WireTransaction> = self
            .get_json("/commerce/transactions/current/sells", true)
            .await?;
        Ok(wire.into_iter().map(Transaction::from).collect())
    }
}

/// In-memory market provider for tests.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves fixed items/prices and mutable order lists.
    #[derive(Default)]
    pub struct MockMarket {
        items: Mutex<HashMap<u64, ItemDetail>>,
        prices: Mutex<HashMap<u64, PriceSnapshot>>,
        buys: Mutex<Vec<Transaction>>,
        sells: Mutex<Vec<Transaction>>,
    }

    impl MockMarket {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert_item(&self, item: ItemDetail) {
            self.items.lock().unwrap().insert(item.id, item);
        }

        pub fn insert_prices(&self, prices: PriceSnapshot) {
            self.prices.lock().unwrap().insert(prices.item_id, prices);
        }

        pub fn push_buy_order(&self, tx: Transaction) {
            self.buys.lock().unwrap().push(tx);
        }

        pub fn push_sell_listing(&self, tx: Transaction) {
            self.sells.lock().unwrap().push(tx);
        }
    }

    #[async_trait]
    impl MarketProvider for MockMarket {
        async fn item(&self, id: u64) -> MarketResult<ItemDetail> {
            self.items
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or(MarketError::ItemNotFound(id))
        }

        async fn prices(&self, id: u64) -> MarketResult<PriceSnapshot> {
            self.prices
                .lock()
                .unwrap()
                .get(&id)
                .copied()
                .ok_or(MarketError::ItemNotFound(id))
        }

        async fn open_buy_orders(&self) -> MarketResult<Vec<Transaction>> {
            Ok(self.buys.lock().unwrap().clone())
        }

        async fn open_sell_listings(&self) -> MarketResult<Vec<Transaction>> {
            Ok(self.sells.lock().unwrap().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn item_endpoint_decodes_and_maps_rarity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/items/19721")
            .with_status(200)
            .with_body(r#"{"id":19721,"name":"Glob of Ectoplasm","rarity":"Exotic","level":0}"#)
            .create_async()
            .await;

        let provider = ApiProvider::with_base_url(server.url());
        let item = provider.item(19721).await.unwrap();
        assert_eq!(item.name, "Glob of Ectoplasm");
        assert_eq!(item.rarity, Rarity::Exotic);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn prices_endpoint_decodes_both_sides() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/commerce/prices/19721")
            .with_status(200)
            .with_body(
                r#"{"id":19721,"buys":{"quantity":100,"unit_price":2500},"sells":{"quantity":50,"unit_price":3000}}"#,
            )
            .create_async()
            .await;

        let provider = ApiProvider::with_base_url(server.url());
        let prices = provider.prices(19721).await.unwrap();
        assert_eq!(prices.highest_buy, 2500);
        assert_eq!(prices.lowest_sell, 3000);
    }

    #[tokio::test]
    async fn transactions_require_api_key() {
        let provider = ApiProvider::with_base_url("http://localhost:1");
        let err = provider.open_buy_orders().await.unwrap_err();
        assert!(matches!(err, MarketError::AuthRequired(_)));
    }

    #[tokio::test]
    async fn api_errors_surface_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/items/1")
            .with_status(404)
            .with_body("no such id")
            .create_async()
            .await;

        let provider = ApiProvider::with_base_url(server.url());
        let err = provider.item(1).await.unwrap_err();
        match err {
            MarketError::Api { status, .. } => assert_eq!(status, 404),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
