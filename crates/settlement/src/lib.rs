//! TradeGate Settlement
//!
//! On-chain side of a trade: revenue distribution and reputation signals
//! against either an EVM contract deployment or a Solana program.
//!
//! ## Layers
//!
//! 1. **Codec**: schema-driven decoding of fixed-layout program accounts,
//!    derived-address computation and instruction encoding.
//! 2. **RPC seams**: [`ProgramRpc`] and [`ContractRpc`] traits with live
//!    implementations (Solana JSON-RPC, alloy provider) and an in-memory
//!    [`MockLedger`] that simulates the programs' create-once semantics.
//! 3. **Gateways**: [`ProgramGateway`] and [`ContractGateway`] build and
//!    broadcast the calls. [`ChainGateway`] picks one of them (or none) once,
//!    at construction, from a [`GatewayConfig`].
//!
//! ## Idempotency
//!
//! Nothing is tracked locally. The Keccak-256 trade reference is passed to the
//! chain, and the chain rejects a reused reference: the program fails to
//! create an already existing receipt/signal account, and the contracts
//! revert with `ReferenceAlreadyProcessed()`. Both surface as
//! [`SettlementError::DuplicateReference`].

mod accounts;
mod codec;
mod config;
mod contract;
mod evm;
mod gateway;
mod mock;
mod pda;
mod program;
mod rpc;
mod split;

pub use accounts::{
    AgentIdentity, DistributionReceipt, ProtocolConfig, RevenueSplit, TradeSignal,
    AGENT_IDENTITY, DISTRIBUTION_RECEIPT, PROTOCOL_CONFIG, REVENUE_SPLIT_CONFIG, TRADE_SIGNAL,
};
pub use codec::{
    account_discriminator, decode_account, derive_address, encode_instruction,
    instruction_discriminator, AccountSchema, ArgValue, DecodedAccount, FieldKind, FieldSpec,
    FieldValue, InstructionArg,
};
pub use config::{
    parse_evm_address, parse_evm_private_key, parse_pubkey, parse_solana_keypair,
    ContractConfig, GatewayConfig, ProgramConfig,
};
pub use contract::ContractGateway;
pub use evm::AlloyContractRpc;
pub use gateway::{ChainGateway, DispatchOutcome, GatewayAction};
pub use mock::{MockContractCall, MockLedger};
pub use pda::{
    associated_token_address, ProgramAddresses, Role, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
pub use program::{DistributionPlan, ProgramGateway};
pub use rpc::{ContractRpc, LiveProgramRpc, ProgramRpc};
pub use split::SplitBreakdown;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Present but malformed configuration. Missing configuration disables
    /// the gateway instead of raising this.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{account} account too short: need {required} bytes, got {actual}")]
    AccountTooShort {
        account: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Malformed {account} account: {reason}")]
    MalformedAccount { account: &'static str, reason: String },

    #[error("Missing {label}: {address}")]
    MissingAccount { label: String, address: String },

    #[error("Reference already processed: {0}")]
    DuplicateReference(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl SettlementError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SettlementError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(label: impl Into<String>, address: impl ToString) -> Self {
        SettlementError::MissingAccount {
            label: label.into(),
            address: address.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;
