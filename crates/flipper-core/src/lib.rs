//! # Flipper Core
//!
//! Everything between the vision layer and the CLI: configuration,
//! trading-post screen knowledge, the screen-driving state machine,
//! the pure trade decision logic, and the orchestration loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Orchestrator                          │
//! │                                                             │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐   │
//! │  │ Machine  │  │ Decision │  │ Landmarks│  │ Screens  │   │
//! │  └──────────┘  └──────────┘  └──────────┘  └──────────┘   │
//! │                                                             │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐                  │
//! │  │  Config  │  │   Poll   │  │   Diag   │                  │
//! │  └──────────┘  └──────────┘  └──────────┘                  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod decision;
pub mod diag;
pub mod landmarks;
pub mod machine;
pub mod orchestrator;
pub mod poll;
pub mod screens;

pub use config::{Blacklist, ConfigError, FlipperConfig, PriceSource};
pub use decision::{plan_relisting, plan_trade, TradeParams, TradePlan};
pub use diag::DiagSink;
pub use landmarks::{LandmarkId, LandmarkSet};
pub use machine::{TradeMachine, MAX_RESET_ESCAPES};
pub use orchestrator::Orchestrator;
pub use poll::{poll_until, retry};
pub use screens::{Geometry, Screen, RESULT_ROWS};

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Landmark(#[from] landmarks::LandmarkError),

    #[error(transparent)]
    Machine(#[from] machine::MachineError),

    #[error(transparent)]
    Orchestrator(#[from] orchestrator::OrchestratorError),

    #[error(transparent)]
    Diag(#[from] diag::DiagError),

    #[error(transparent)]
    Market(#[from] flipper_market::MarketError),

    #[error(transparent)]
    Vision(#[from] flipper_vision::VisionError),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
