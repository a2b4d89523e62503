//! Settlement program account layouts

use solana_sdk::pubkey::Pubkey;

use crate::codec::{decode_account, AccountSchema, FieldKind as K, FieldSpec, FieldValue};
use crate::Result;

pub const MAX_BPS: u16 = 10_000;

pub const PROTOCOL_CONFIG: AccountSchema = AccountSchema::new(
    "ProtocolConfig",
    &[
        FieldSpec::new("admin", K::Pubkey),
        FieldSpec::new("settlement_mint", K::Pubkey),
        FieldSpec::new("settlement_vault", K::Pubkey),
        FieldSpec::new("protocol_treasury_token_account", K::Pubkey),
        FieldSpec::new("protocol_fee_bps", K::U16),
        FieldSpec::new("min_confidence_bps", K::U16),
        FieldSpec::new("score_alpha_bps", K::U16),
        FieldSpec::new("max_signal_age", K::I64),
        FieldSpec::new("require_verified_for_score", K::Bool),
        FieldSpec::new("enforce_settlement_token", K::Bool),
        FieldSpec::new("paused", K::Bool),
        FieldSpec::new("vault_authority_bump", K::U8),
        FieldSpec::new("bump", K::U8),
    ],
);

/// Fixed prefix only: a length-prefixed URI follows `agent_wallet`.
pub const AGENT_IDENTITY: AccountSchema = AccountSchema::new(
    "AgentIdentity",
    &[
        FieldSpec::new("id", K::U64),
        FieldSpec::new("owner", K::Pubkey),
        FieldSpec::new("agent_wallet", K::Pubkey),
    ],
);

pub const REVENUE_SPLIT_CONFIG: AccountSchema = AccountSchema::new(
    "RevenueSplitConfig",
    &[
        FieldSpec::new("agent", K::Pubkey),
        FieldSpec::new("platform", K::Pubkey),
        FieldSpec::new("platform_bps", K::U16),
        FieldSpec::new("referrer", K::Pubkey),
        FieldSpec::new("referrer_bps", K::U16),
        FieldSpec::new("reserve_vault", K::Pubkey),
        FieldSpec::new("reserve_bps", K::U16),
        FieldSpec::new("bump", K::U8),
    ],
);

pub const DISTRIBUTION_RECEIPT: AccountSchema = AccountSchema::new(
    "DistributionReceipt",
    &[
        FieldSpec::new("agent", K::Pubkey),
        FieldSpec::new("reference", K::Bytes32),
        FieldSpec::new("amount", K::U64),
        FieldSpec::new("operator", K::Pubkey),
        FieldSpec::new("distributed_at", K::I64),
        FieldSpec::new("bump", K::U8),
    ],
);

pub const TRADE_SIGNAL: AccountSchema = AccountSchema::new(
    "TradeSignal",
    &[
        FieldSpec::new("agent", K::Pubkey),
        FieldSpec::new("trade_id_hash", K::Bytes32),
        FieldSpec::new("result_hash", K::Bytes32),
        FieldSpec::new("context_hash", K::Bytes32),
        FieldSpec::new("reporter", K::Pubkey),
        FieldSpec::new("submitted_at", K::I64),
        FieldSpec::new("risk_flags", K::U8),
        FieldSpec::new("score_submitted", K::Bool),
        FieldSpec::new("score_hash", K::Bytes32),
        FieldSpec::new("score", K::U16),
        FieldSpec::new("confidence_bps", K::U16),
        FieldSpec::new("oracle", K::Pubkey),
        FieldSpec::new("score_submitted_at", K::I64),
        FieldSpec::new("bump", K::U8),
    ],
);

/// Global protocol parameters, read fresh on every distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub admin: Pubkey,
    pub settlement_mint: Pubkey,
    pub settlement_vault: Pubkey,
    pub protocol_treasury_token_account: Pubkey,
    pub protocol_fee_bps: u16,
    pub paused: bool,
    pub vault_authority_bump: u8,
}

impl ProtocolConfig {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let d = decode_account(data, &PROTOCOL_CONFIG)?;
        Ok(Self {
            admin: d.pubkey("admin")?,
            settlement_mint: d.pubkey("settlement_mint")?,
            settlement_vault: d.pubkey("settlement_vault")?,
            protocol_treasury_token_account: d.pubkey("protocol_treasury_token_account")?,
            protocol_fee_bps: d.u16("protocol_fee_bps")?,
            paused: d.bool("paused")?,
            vault_authority_bump: d.u8("vault_authority_bump")?,
        })
    }

    /// Account bytes with the unmodelled fields zeroed.
    pub fn encode(&self) -> Result<Vec<u8>> {
        PROTOCOL_CONFIG.encode(&[
            FieldValue::Pubkey(self.admin),
            FieldValue::Pubkey(self.settlement_mint),
            FieldValue::Pubkey(self.settlement_vault),
            FieldValue::Pubkey(self.protocol_treasury_token_account),
            FieldValue::U16(self.protocol_fee_bps),
            FieldValue::U16(0),
            FieldValue::U16(0),
            FieldValue::I64(0),
            FieldValue::Bool(false),
            FieldValue::Bool(true),
            FieldValue::Bool(self.paused),
            FieldValue::U8(self.vault_authority_bump),
            FieldValue::U8(0),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentIdentity {
    pub id: u64,
    pub owner: Pubkey,
    pub agent_wallet: Pubkey,
}

impl AgentIdentity {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let d = decode_account(data, &AGENT_IDENTITY)?;
        Ok(Self {
            id: d.u64("id")?,
            owner: d.pubkey("owner")?,
            agent_wallet: d.pubkey("agent_wallet")?,
        })
    }

    /// Prefix followed by an empty URI.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut data = AGENT_IDENTITY.encode(&[
            FieldValue::U64(self.id),
            FieldValue::Pubkey(self.owner),
            FieldValue::Pubkey(self.agent_wallet),
        ])?;
        data.extend_from_slice(&0u32.to_le_bytes());
        Ok(data)
    }
}

/// Per-agent revenue split. Whatever the beneficiaries and the protocol fee
/// do not take goes to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueSplit {
    pub agent: Pubkey,
    pub platform: Pubkey,
    pub platform_bps: u16,
    pub referrer: Pubkey,
    pub referrer_bps: u16,
    pub reserve_vault: Pubkey,
    pub reserve_bps: u16,
}

impl RevenueSplit {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let d = decode_account(data, &REVENUE_SPLIT_CONFIG)?;
        Ok(Self {
            agent: d.pubkey("agent")?,
            platform: d.pubkey("platform")?,
            platform_bps: d.u16("platform_bps")?,
            referrer: d.pubkey("referrer")?,
            referrer_bps: d.u16("referrer_bps")?,
            reserve_vault: d.pubkey("reserve_vault")?,
            reserve_bps: d.u16("reserve_bps")?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        REVENUE_SPLIT_CONFIG.encode(&[
            FieldValue::Pubkey(self.agent),
            FieldValue::Pubkey(self.platform),
            FieldValue::U16(self.platform_bps),
            FieldValue::Pubkey(self.referrer),
            FieldValue::U16(self.referrer_bps),
            FieldValue::Pubkey(self.reserve_vault),
            FieldValue::U16(self.reserve_bps),
            FieldValue::U8(0),
        ])
    }

    /// Sum of the beneficiary shares, excluding the agent's remainder.
    pub fn beneficiary_bps(&self) -> u32 {
        self.platform_bps as u32 + self.referrer_bps as u32 + self.reserve_bps as u32
    }
}

/// Create-once record of a processed distribution reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionReceipt {
    pub agent: Pubkey,
    pub reference: [u8; 32],
    pub amount: u64,
    pub operator: Pubkey,
    pub distributed_at: i64,
}

impl DistributionReceipt {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let d = decode_account(data, &DISTRIBUTION_RECEIPT)?;
        Ok(Self {
            agent: d.pubkey("agent")?,
            reference: d.bytes32("reference")?,
            amount: d.u64("amount")?,
            operator: d.pubkey("operator")?,
            distributed_at: d.i64("distributed_at")?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        DISTRIBUTION_RECEIPT.encode(&[
            FieldValue::Pubkey(self.agent),
            FieldValue::Bytes32(self.reference),
            FieldValue::U64(self.amount),
            FieldValue::Pubkey(self.operator),
            FieldValue::I64(self.distributed_at),
            FieldValue::U8(0),
        ])
    }
}

/// Signal submitted for one trade. Score fields are filled later by the
/// oracle and are not modelled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeSignal {
    pub agent: Pubkey,
    pub trade_id_hash: [u8; 32],
    pub result_hash: [u8; 32],
    pub context_hash: [u8; 32],
    pub reporter: Pubkey,
    pub submitted_at: i64,
    pub risk_flags: u8,
    pub score_submitted: bool,
}

impl TradeSignal {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let d = decode_account(data, &TRADE_SIGNAL)?;
        Ok(Self {
            agent: d.pubkey("agent")?,
            trade_id_hash: d.bytes32("trade_id_hash")?,
            result_hash: d.bytes32("result_hash")?,
            context_hash: d.bytes32("context_hash")?,
            reporter: d.pubkey("reporter")?,
            submitted_at: d.i64("submitted_at")?,
            risk_flags: d.u8("risk_flags")?,
            score_submitted: d.bool("score_submitted")?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        TRADE_SIGNAL.encode(&[
            FieldValue::Pubkey(self.agent),
            FieldValue::Bytes32(self.trade_id_hash),
            FieldValue::Bytes32(self.result_hash),
            FieldValue::Bytes32(self.context_hash),
            FieldValue::Pubkey(self.reporter),
            FieldValue::I64(self.submitted_at),
            FieldValue::U8(self.risk_flags),
            FieldValue::Bool(self.score_submitted),
            FieldValue::Bytes32([0u8; 32]),
            FieldValue::U16(0),
            FieldValue::U16(0),
            FieldValue::Pubkey(Pubkey::default()),
            FieldValue::I64(0),
            FieldValue::U8(0),
        ])
    }
}
