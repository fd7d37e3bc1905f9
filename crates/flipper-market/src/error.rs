//! Error types for the market layer.

use thiserror::Error;

/// Errors raised by the trading post API client and listing scraper.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Item {0} not found")]
    ItemNotFound(u64),

    #[error("API key required for {0}")]
    AuthRequired(&'static str),

    #[error("Failed to parse listing page: {0}")]
    ListingParse(String),

    #[error("Invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for market operations.
pub type MarketResult<T> = Result<T, MarketError>;
