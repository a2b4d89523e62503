//! Gateway configuration and credential parsing
//!
//! Every field is optional. A gateway whose required fields are not all
//! present is disabled, but a field that is present and malformed is an
//! error: a typo in a key should stop startup, not silently turn off payouts.

use std::str::FromStr;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use tradegate_core::{ChainKind, GatewayMode};

use crate::{Result, SettlementError};

/// Account-model (EVM) endpoint and credential
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractConfig {
    pub rpc_url: Option<String>,
    pub chain_id: Option<u64>,
    /// Revenue split hub or reputation oracle, depending on the action
    pub contract_address: Option<String>,
    /// 0x-prefixed 32-byte hex key
    pub private_key: Option<String>,
}

impl ContractConfig {
    pub fn is_complete(&self) -> bool {
        present(&self.rpc_url)
            && self.chain_id.is_some_and(|id| id > 0)
            && present(&self.contract_address)
            && present(&self.private_key)
    }
}

/// Program-model (Solana) endpoint and credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramConfig {
    pub rpc_url: Option<String>,
    pub program_id: Option<String>,
    /// JSON array of 64 bytes, or base58
    pub secret_key: Option<String>,
    /// Defaults to the SPL Token program
    pub token_program_id: Option<String>,
    pub commitment: String,
    /// Risk flags used when a signal does not carry its own
    pub default_risk_flags: u8,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            rpc_url: None,
            program_id: None,
            secret_key: None,
            token_program_id: None,
            commitment: "confirmed".to_string(),
            default_risk_flags: 0,
        }
    }
}

impl ProgramConfig {
    pub fn is_complete(&self) -> bool {
        present(&self.rpc_url) && present(&self.program_id) && present(&self.secret_key)
    }
}

/// Configuration for one post-trade action (distribution or signal).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayConfig {
    pub enabled: bool,
    pub chain: ChainKind,
    pub mode: GatewayMode,
    pub contract: ContractConfig,
    pub program: ProgramConfig,
}

impl GatewayConfig {
    /// Disabled configuration
    pub fn disabled() -> Self {
        Self::default()
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

pub fn parse_pubkey(value: &str, field: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim()).map_err(|_| {
        SettlementError::Configuration(format!("{} must be a valid Solana public key", field))
    })
}

/// Accepts a JSON array of 64 numbers or a base58 string of 64 bytes.
pub fn parse_solana_keypair(value: &str, field: &str) -> Result<Keypair> {
    let invalid = || {
        SettlementError::Configuration(format!(
            "{} must be a 64-byte secret key (JSON array or base58)",
            field
        ))
    };
    let trimmed = value.trim();
    let bytes: Vec<u8> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|_| invalid())?
    } else {
        bs58::decode(trimmed).into_vec().map_err(|_| invalid())?
    };
    if bytes.len() != 64 {
        return Err(invalid());
    }
    Keypair::try_from(bytes.as_slice()).map_err(|_| invalid())
}

pub fn parse_evm_address(value: &str, field: &str) -> Result<Address> {
    let trimmed = value.trim();
    let invalid = || SettlementError::Configuration(format!("{} must be a 0x-prefixed 20-byte address", field));
    let digits = trimmed.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 {
        return Err(invalid());
    }
    Address::from_str(trimmed).map_err(|_| invalid())
}

pub fn parse_evm_private_key(value: &str, field: &str) -> Result<PrivateKeySigner> {
    let trimmed = value.trim();
    let invalid = || SettlementError::Configuration(format!("{} must be 0x-prefixed 32-byte hex", field));
    let digits = trimmed.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    PrivateKeySigner::from_str(digits).map_err(|_| invalid())
}
