//! TradeGate Settings
//!
//! Configuration for the gateway service and its tooling.
//!
//! ## Sources
//!
//! - JSON file ([`Settings::load_from`])
//! - Environment variables, using the deployment's established names
//!   ([`Settings::from_env`])
//!
//! Values are format-checked when loaded. Whether a post-trade action has
//! everything it needs is decided later, when its gateway is built.
//!
//! ## Usage
//!
//! ```no_run
//! use tradegate_settings::Settings;
//!
//! let settings = Settings::from_env()?;
//! println!("listening on port {}", settings.server.port);
//! # Ok::<(), tradegate_settings::SettingsError>(())
//! ```

mod config;
mod env;

pub use config::{
    DistributionSettings, EvmSettings, LogFormat, LoggingSettings, ServerSettings, Settings,
    SignalSettings, SolanaSettings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    ReadError(std::io::Error),

    #[error("Failed to parse settings: {0}")]
    ParseError(serde_json::Error),

    #[error("{key} {reason}")]
    InvalidValue { key: String, reason: String },
}

impl SettingsError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        SettingsError::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;
