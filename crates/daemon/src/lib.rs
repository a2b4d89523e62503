//! TradeGate Daemon
//!
//! HTTP service that acknowledges executed trades and settles them on-chain
//! in the background.
//!
//! ## Components
//!
//! - **SettlementOrchestrator**: immediate acknowledgment plus isolated
//!   post-trade tasks (revenue distribution, reputation signal)
//! - **bootstrap**: settings to gateways, once at startup
//! - **http**: axum router (`POST /trade/execute`, `GET /health`)

mod bootstrap;
mod http;
mod service;

pub use bootstrap::{
    build_orchestrator, build_orchestrator_with_ledger, describe, distribution_config, signal_config,
};
pub use http::{router, serve, MAX_BODY_BYTES};
pub use service::{ActionOutcome, PostTradeActions, PostTradeReport, SettlementOrchestrator};

use thiserror::Error;
use tradegate_settings::SettingsError;
use tradegate_settlement::SettlementError;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
