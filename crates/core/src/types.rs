use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CoreError, Result};

/// 32-byte digest
pub type Hash32 = [u8; 32];

/// All-zero digest, used when a caller omits an optional hash
pub const ZERO_HASH: Hash32 = [0u8; 32];

/// Agent identifier.
///
/// Encoded as a little-endian u64 seed on the program runtime and widened to
/// uint256 on the contract runtime, so every value round-trips exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(u64);

impl AgentId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }

    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Accept a JSON number or a decimal string, as callers send either.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(Self)
                .ok_or_else(|| CoreError::InvalidAgentId(n.to_string())),
            Value::String(s) => s.parse(),
            other => Err(CoreError::InvalidAgentId(other.to_string())),
        }
    }
}

impl FromStr for AgentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidAgentId(s.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(Self)
            .map_err(|_| CoreError::InvalidAgentId(s.to_string()))
    }
}

impl From<u64> for AgentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keccak-256 digest of a trade identifier.
///
/// The single idempotency key for a trade: reused as the distribution
/// reference and the signal trade hash on both runtimes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TradeReference(Hash32);

impl TradeReference {
    pub const fn from_bytes(bytes: Hash32) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &Hash32 {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for TradeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TradeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TradeReference({})", self.to_hex())
    }
}

/// Amount of the settlement asset in base units. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DistributionAmount(u128);

impl DistributionAmount {
    pub fn new(amount: u128) -> Result<Self> {
        if amount == 0 {
            return Err(CoreError::InvalidAmount("distribution amount must be positive".to_string()));
        }
        Ok(Self(amount))
    }

    pub const fn get(&self) -> u128 {
        self.0
    }

    /// Narrow to u64 for the program runtime.
    pub fn as_u64(&self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }
}

impl FromStr for DistributionAmount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidAmount(format!(
                "distribution amount must be a positive integer string, got {:?}",
                s
            )));
        }
        let value = trimmed.parse::<u128>().map_err(|_| {
            CoreError::InvalidAmount(format!("distribution amount out of range: {}", s))
        })?;
        Self::new(value)
    }
}

impl fmt::Display for DistributionAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime family a gateway talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// Account/contract-call model
    #[default]
    Evm,
    /// Program/derived-address model
    Solana,
}

impl ChainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainKind::Evm => "evm",
            ChainKind::Solana => "solana",
        }
    }
}

impl FromStr for ChainKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "evm" => Ok(ChainKind::Evm),
            "solana" => Ok(ChainKind::Solana),
            other => Err(CoreError::InvalidRequest(format!(
                "chain must be \"evm\" or \"solana\", got {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether gateways broadcast to real endpoints or to the in-memory ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    #[default]
    Live,
    /// In-memory ledger for development and tests. Nothing leaves the process.
    Mock,
}

/// Parse a `0x`-prefixed 32-byte hex string.
pub fn parse_bytes32_hex(value: &str, field: &'static str) -> Result<Hash32> {
    let digits = value
        .strip_prefix("0x")
        .filter(|d| d.len() == 64)
        .ok_or(CoreError::InvalidHash { field })?;
    let mut out = [0u8; 32];
    hex::decode_to_slice(digits, &mut out).map_err(|_| CoreError::InvalidHash { field })?;
    Ok(out)
}

/// Format a digest as `0x`-prefixed lowercase hex.
pub fn bytes32_hex(bytes: &Hash32) -> String {
    format!("0x{}", hex::encode(bytes))
}
