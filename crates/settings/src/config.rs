//! Configuration types

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;
use tradegate_core::{is_base58_address, ChainKind, DistributionAmount, GatewayMode};

use crate::{Result, SettingsError};

/// Main settings structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    /// Live endpoints, or the in-memory ledger for both actions
    #[serde(default)]
    pub mode: GatewayMode,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Revenue distribution
    #[serde(default)]
    pub distribution: DistributionSettings,

    /// Reputation signal submission
    #[serde(default)]
    pub signal: SignalSettings,

    /// Settings file path (not serialized)
    #[serde(skip)]
    pub(crate) config_path: Option<PathBuf>,
}

impl Settings {
    /// Load and validate settings from a JSON file.
    ///
    /// A missing file yields defaults, which leave both actions disabled.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(SettingsError::ReadError)?;
            let settings: Settings =
                serde_json::from_str(&content).map_err(SettingsError::ParseError)?;
            info!("Loaded settings from {:?}", path);
            settings
        } else {
            Self::default()
        };
        settings.config_path = Some(path.clone());
        settings.validate()?;
        Ok(settings)
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    /// Format checks for every value that is present.
    ///
    /// Absent values are fine here: an action missing required values is
    /// disabled when its gateway is built.
    pub fn validate(&self) -> Result<()> {
        let dist = &self.distribution;
        dist.amount()?;
        check_evm_address(&dist.evm.contract_address, "SPLIT_HUB_ADDRESS")?;
        check_private_key(&dist.evm.private_key, "OPERATOR_PRIVATE_KEY")?;
        check_solana_address(&dist.solana.program_id, "DISTRIBUTION_SOLANA_PROGRAM_ID")?;
        check_solana_address(&dist.solana.token_program_id, "DISTRIBUTION_SOLANA_TOKEN_PROGRAM_ID")?;
        check_commitment(&dist.solana.commitment)?;

        let signal = &self.signal;
        check_evm_address(&signal.evm.contract_address, "REPUTATION_ORACLE_ADDRESS")?;
        check_private_key(&signal.evm.private_key, "SIGNALER_PRIVATE_KEY")?;
        check_solana_address(&signal.solana.program_id, "SIGNAL_SOLANA_PROGRAM_ID")?;
        check_commitment(&signal.solana.commitment)?;
        Ok(())
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4321
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(SettingsError::invalid("LOG_FORMAT", "must be either pretty or json")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub format: LogFormat,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info,tradegate=debug".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

/// EVM endpoint and credential for one action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvmSettings {
    #[serde(default)]
    pub rpc_url: Option<String>,

    #[serde(default)]
    pub chain_id: Option<u64>,

    /// Split hub (distribution) or reputation oracle (signal)
    #[serde(default)]
    pub contract_address: Option<String>,

    #[serde(default)]
    pub private_key: Option<String>,
}

/// Solana endpoint and credential for one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolanaSettings {
    #[serde(default)]
    pub rpc_url: Option<String>,

    #[serde(default)]
    pub program_id: Option<String>,

    /// JSON array of 64 bytes, or base58
    #[serde(default)]
    pub secret_key: Option<String>,

    #[serde(default)]
    pub token_program_id: Option<String>,

    #[serde(default = "default_commitment")]
    pub commitment: String,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

impl Default for SolanaSettings {
    fn default() -> Self {
        Self {
            rpc_url: None,
            program_id: None,
            secret_key: None,
            token_program_id: None,
            commitment: default_commitment(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub chain: ChainKind,

    /// Smallest-unit amount distributed per trade, as a decimal string
    #[serde(default = "default_amount")]
    pub amount: String,

    #[serde(default)]
    pub evm: EvmSettings,

    #[serde(default)]
    pub solana: SolanaSettings,
}

fn default_amount() -> String {
    "10000".to_string()
}

impl Default for DistributionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            chain: ChainKind::default(),
            amount: default_amount(),
            evm: EvmSettings::default(),
            solana: SolanaSettings::default(),
        }
    }
}

impl DistributionSettings {
    pub fn amount(&self) -> Result<DistributionAmount> {
        if self.amount.is_empty() || !self.amount.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SettingsError::invalid(
                "REVENUE_DISTRIBUTION_AMOUNT",
                "must be a positive integer string",
            ));
        }
        if self.amount.bytes().all(|b| b == b'0') {
            return Err(SettingsError::invalid("REVENUE_DISTRIBUTION_AMOUNT", "must be greater than 0"));
        }
        DistributionAmount::from_str(&self.amount)
            .map_err(|_| SettingsError::invalid("REVENUE_DISTRIBUTION_AMOUNT", "is out of range"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub chain: ChainKind,

    #[serde(default)]
    pub evm: EvmSettings,

    #[serde(default)]
    pub solana: SolanaSettings,

    /// Risk flags sent when a trade does not carry its own (Solana only)
    #[serde(default)]
    pub default_risk_flags: u8,
}

fn check_evm_address(value: &Option<String>, key: &str) -> Result<()> {
    match value.as_deref() {
        Some(v) if !is_hex_with_prefix(v, 40) => {
            Err(SettingsError::invalid(key, "must be a valid 20-byte hex address"))
        }
        _ => Ok(()),
    }
}

fn check_private_key(value: &Option<String>, key: &str) -> Result<()> {
    match value.as_deref() {
        Some(v) if !is_hex_with_prefix(v, 64) => {
            Err(SettingsError::invalid(key, "must be a valid 32-byte private key"))
        }
        _ => Ok(()),
    }
}

fn check_solana_address(value: &Option<String>, key: &str) -> Result<()> {
    match value.as_deref() {
        Some(v) if !is_base58_address(v) => {
            Err(SettingsError::invalid(key, "must be a valid base58 Solana address"))
        }
        _ => Ok(()),
    }
}

fn check_commitment(value: &str) -> Result<()> {
    match value {
        "processed" | "confirmed" | "finalized" => Ok(()),
        _ => Err(SettingsError::invalid(
            "SOLANA_COMMITMENT",
            "must be one of processed, confirmed, finalized",
        )),
    }
}

fn is_hex_with_prefix(value: &str, digits: usize) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == digits && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}
