//! Configuration for the flipper.
//!
//! A single TOML file drives everything: which process to attach to,
//! where templates live, listing filters, trade tunables, and all the
//! timing knobs. Two small JSON side files hold the item blacklist
//! and the OCR correction table, both optional.

use crate::decision::TradeParams;
use flipper_market::{FilterParams, Rarity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur in configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// The target client and how to find its UI assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Process name the target window belongs to
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Directory holding the landmark template bitmaps
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Template match tolerance, 1.0 requiring exact pixels
    #[serde(default = "default_match_tolerance")]
    pub match_tolerance: f64,
}

fn default_process_name() -> String {
    "Gw2-64".to_string()
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_match_tolerance() -> f64 {
    1.0
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            process_name: default_process_name(),
            templates_dir: default_templates_dir(),
            match_tolerance: default_match_tolerance(),
        }
    }
}

/// Where prices come from when deciding a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    /// Read prices off the item window via OCR and the clipboard
    #[default]
    Ocr,
    /// Query the trading post API instead
    Api,
}

/// Market data sources and listing filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Account API key, needed for the cancel-undercut sweep
    #[serde(default)]
    pub api_key: String,

    /// Trading post API root
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Ranked listing site root
    #[serde(default = "default_listing_base")]
    pub listing_base: String,

    /// Where trade decisions take their live prices from
    #[serde(default)]
    pub price_source: PriceSource,

    /// Minimum per-unit profit for a candidate, in copper
    #[serde(default = "default_min_profit")]
    pub min_profit: i64,

    /// Minimum daily sales volume for a candidate
    #[serde(default = "default_min_sold")]
    pub min_sold: u32,

    /// Buy-in price bounds, in copper
    #[serde(default = "default_min_buy_price")]
    pub min_buy_price: i64,
    #[serde(default = "default_max_buy_price")]
    pub max_buy_price: i64,

    /// Inclusive rarity band for candidates
    #[serde(default = "default_min_rarity")]
    pub min_rarity: Rarity,
    #[serde(default = "default_max_rarity")]
    pub max_rarity: Rarity,

    /// Listing pages to pull per refresh
    #[serde(default = "default_pages")]
    pub pages: u32,
}

fn default_api_base() -> String {
    flipper_market::DEFAULT_API_BASE.to_string()
}

fn default_listing_base() -> String {
    flipper_market::DEFAULT_LISTING_BASE.to_string()
}

fn default_min_profit() -> i64 {
    100
}

fn default_min_sold() -> u32 {
    50
}

fn default_min_buy_price() -> i64 {
    100
}

fn default_max_buy_price() -> i64 {
    100_000
}

fn default_min_rarity() -> Rarity {
    Rarity::Junk
}

fn default_max_rarity() -> Rarity {
    Rarity::Legendary
}

fn default_pages() -> u32 {
    3
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            listing_base: default_listing_base(),
            price_source: PriceSource::default(),
            min_profit: default_min_profit(),
            min_sold: default_min_sold(),
            min_buy_price: default_min_buy_price(),
            max_buy_price: default_max_buy_price(),
            min_rarity: default_min_rarity(),
            max_rarity: default_max_rarity(),
            pages: default_pages(),
        }
    }
}

impl MarketConfig {
    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            min_profit: self.min_profit,
            min_sold: self.min_sold,
            min_buy_price: self.min_buy_price,
            max_buy_price: self.max_buy_price,
            min_rarity: self.min_rarity,
            max_rarity: self.max_rarity,
            pages: self.pages,
        }
    }
}

/// Trade planning tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeConfig {
    /// Maximum coin per buy order, in copper
    #[serde(default = "default_max_spend")]
    pub max_spend: i64,

    /// Fraction of daily volume we are willing to absorb
    #[serde(default = "default_quantity_fraction")]
    pub quantity_fraction: f64,

    /// Price plausibility factor in (0, 1]
    #[serde(default = "default_error_range")]
    pub error_range: f64,

    /// Fraction of promised profit we insist on
    #[serde(default = "default_profit_range")]
    pub profit_range: f64,

    /// Candidates attempted per cycle before moving to selling
    #[serde(default = "default_buys_per_cycle")]
    pub buys_per_cycle: usize,

    /// Fee rate charged when a sale is posted
    #[serde(default = "default_listing_fee_rate")]
    pub listing_fee_rate: f64,

    /// Fee rate charged when a sale completes
    #[serde(default = "default_exchange_fee_rate")]
    pub exchange_fee_rate: f64,
}

fn default_max_spend() -> i64 {
    50_000
}

fn default_buys_per_cycle() -> usize {
    10
}

fn default_quantity_fraction() -> f64 {
    0.1
}

fn default_error_range() -> f64 {
    0.8
}

fn default_profit_range() -> f64 {
    0.75
}

fn default_listing_fee_rate() -> f64 {
    0.05
}

fn default_exchange_fee_rate() -> f64 {
    0.10
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            max_spend: default_max_spend(),
            quantity_fraction: default_quantity_fraction(),
            error_range: default_error_range(),
            profit_range: default_profit_range(),
            buys_per_cycle: default_buys_per_cycle(),
            listing_fee_rate: default_listing_fee_rate(),
            exchange_fee_rate: default_exchange_fee_rate(),
        }
    }
}

impl TradeConfig {
    pub fn trade_params(&self) -> TradeParams {
        TradeParams {
            max_spend: self.max_spend,
            quantity_fraction: self.quantity_fraction,
            error_range: self.error_range,
            profit_range: self.profit_range,
            listing_fee_rate: self.listing_fee_rate,
            exchange_fee_rate: self.exchange_fee_rate,
        }
    }
}

/// Timing knobs for the orchestrator and UI polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Inter-cycle sleep bounds, seconds
    #[serde(default = "default_cycle_min_secs")]
    pub cycle_min_secs: u64,
    #[serde(default = "default_cycle_max_secs")]
    pub cycle_max_secs: u64,

    /// Minimum age before the candidate list is refreshed, seconds
    #[serde(default = "default_refresh_cooldown_secs")]
    pub refresh_cooldown_secs: u64,

    /// Anti-AFK keepalive period, seconds
    #[serde(default = "default_anti_afk_secs")]
    pub anti_afk_secs: u64,

    /// Deadline for a single UI reaction, milliseconds
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Spacing between UI probes, milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_cycle_min_secs() -> u64 {
    180
}

fn default_cycle_max_secs() -> u64 {
    300
}

fn default_refresh_cooldown_secs() -> u64 {
    900
}

fn default_anti_afk_secs() -> u64 {
    1800
}

fn default_poll_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycle_min_secs: default_cycle_min_secs(),
            cycle_max_secs: default_cycle_max_secs(),
            refresh_cooldown_secs: default_refresh_cooldown_secs(),
            anti_afk_secs: default_anti_afk_secs(),
            poll_timeout_ms: default_poll_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TimingConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn refresh_cooldown(&self) -> Duration {
        Duration::from_secs(self.refresh_cooldown_secs)
    }

    pub fn anti_afk_period(&self) -> Duration {
        Duration::from_secs(self.anti_afk_secs)
    }
}

/// Data and side-file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root for logs and diagnostic captures
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Item blacklist, JSON `{"ids": [..], "names": [..]}`
    #[serde(default = "default_blacklist_file")]
    pub blacklist_file: PathBuf,

    /// OCR correction table, JSON object of recognized -> canonical
    #[serde(default = "default_corrections_file")]
    pub corrections_file: PathBuf,

    /// OCR mismatch log
    #[serde(default = "default_mismatch_log")]
    pub mismatch_log: PathBuf,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flipper")
}

fn default_blacklist_file() -> PathBuf {
    PathBuf::from("blacklist.json")
}

fn default_corrections_file() -> PathBuf {
    PathBuf::from("corrections.json")
}

fn default_mismatch_log() -> PathBuf {
    PathBuf::from("logs/ocr_mismatches.txt")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            blacklist_file: default_blacklist_file(),
            corrections_file: default_corrections_file(),
            mismatch_log: default_mismatch_log(),
        }
    }
}

impl PathsConfig {
    /// Relative side-file paths resolve under `data_dir`.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn blacklist_path(&self) -> PathBuf {
        self.resolve(&self.blacklist_file)
    }

    pub fn corrections_path(&self) -> PathBuf {
        self.resolve(&self.corrections_file)
    }

    pub fn mismatch_log_path(&self) -> PathBuf {
        self.resolve(&self.mismatch_log)
    }
}

/// The item blacklist side file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blacklist {
    #[serde(default)]
    pub ids: HashSet<u64>,
    #[serde(default)]
    pub names: HashSet<String>,
}

impl Blacklist {
    /// Load the blacklist; a missing file is an empty blacklist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlipperConfig {
    #[serde(default)]
    pub game: GameConfig,

    #[serde(default)]
    pub market: MarketConfig,

    #[serde(default)]
    pub trade: TradeConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

impl FlipperConfig {
    /// Load configuration from a specific file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load from the default location, falling back to defaults when
    /// no file exists.
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from(path);
            }
            debug!(path = %path.display(), "no config file, using defaults");
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Default config file location under the user config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("flipper").join("config.toml"))
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.game.process_name.is_empty() {
            return Err(ConfigError::Invalid(
                "game.process_name must not be empty".to_string(),
            ));
        }
        if !(0.0 < self.game.match_tolerance && self.game.match_tolerance <= 1.0) {
            return Err(ConfigError::Invalid(
                "game.match_tolerance must be in (0, 1]".to_string(),
            ));
        }
        if !(0.0 < self.trade.error_range && self.trade.error_range <= 1.0) {
            return Err(ConfigError::Invalid(
                "trade.error_range must be in (0, 1]".to_string(),
            ));
        }
        if !(0.0 < self.trade.quantity_fraction && self.trade.quantity_fraction <= 1.0) {
            return Err(ConfigError::Invalid(
                "trade.quantity_fraction must be in (0, 1]".to_string(),
            ));
        }
        if self.trade.profit_range <= 0.0 {
            return Err(ConfigError::Invalid(
                "trade.profit_range must be positive".to_string(),
            ));
        }
        if self.trade.max_spend <= 0 {
            return Err(ConfigError::Invalid(
                "trade.max_spend must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.trade.listing_fee_rate)
            || !(0.0..1.0).contains(&self.trade.exchange_fee_rate)
            || self.trade.listing_fee_rate + self.trade.exchange_fee_rate >= 1.0
        {
            return Err(ConfigError::Invalid(
                "trade fee rates must lie in [0, 1) and sum below 1".to_string(),
            ));
        }
        if self.trade.buys_per_cycle == 0 {
            return Err(ConfigError::Invalid(
                "trade.buys_per_cycle must be positive".to_string(),
            ));
        }
        if self.timing.cycle_min_secs > self.timing.cycle_max_secs {
            return Err(ConfigError::Invalid(
                "timing.cycle_min_secs must not exceed cycle_max_secs".to_string(),
            ));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.market.min_rarity > self.market.max_rarity {
            return Err(ConfigError::Invalid(
                "market.min_rarity must not exceed max_rarity".to_string(),
            ));
        }
        if self.market.price_source == PriceSource::Api && self.market.api_key.is_empty() {
            return Err(ConfigError::Invalid(
                "market.api_key is required when price_source = \"api\"".to_string(),
            ));
        }
        Ok(())
    }
}
