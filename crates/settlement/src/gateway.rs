//! Runtime selection for a post-trade action
//!
//! A [`ChainGateway`] is built once from a [`GatewayConfig`] and never
//! reconfigured. Which runtime (if any) handles the action is decided here and
//! nowhere else.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tracing::warn;
use tradegate_core::{AgentId, ChainKind, DistributionAmount, GatewayMode, Hash32, TradeReference};

use crate::config::{
    parse_evm_address, parse_evm_private_key, parse_pubkey, parse_solana_keypair, GatewayConfig,
};
use crate::contract::ContractGateway;
use crate::evm::AlloyContractRpc;
use crate::mock::MockLedger;
use crate::pda::TOKEN_PROGRAM_ID;
use crate::program::ProgramGateway;
use crate::rpc::{ContractRpc, LiveProgramRpc, ProgramRpc};
use crate::{Result, SettlementError};

/// The two post-trade actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayAction {
    Distribution,
    Signal,
}

/// Configuration key names for one action, used in warnings and errors.
struct FieldNames {
    evm_rpc_url: &'static str,
    evm_chain_id: &'static str,
    evm_contract: &'static str,
    evm_private_key: &'static str,
    solana_rpc_url: &'static str,
    solana_program_id: &'static str,
    solana_secret_key: &'static str,
    solana_token_program_id: &'static str,
}

impl GatewayAction {
    /// Label attached to every log line about this action
    pub fn label(&self) -> &'static str {
        match self {
            GatewayAction::Distribution => "revenue distribution",
            GatewayAction::Signal => "signal submission",
        }
    }

    fn fields(&self) -> FieldNames {
        match self {
            GatewayAction::Distribution => FieldNames {
                evm_rpc_url: "RPC_URL",
                evm_chain_id: "CHAIN_ID",
                evm_contract: "SPLIT_HUB_ADDRESS",
                evm_private_key: "OPERATOR_PRIVATE_KEY",
                solana_rpc_url: "DISTRIBUTION_SOLANA_RPC_URL",
                solana_program_id: "DISTRIBUTION_SOLANA_PROGRAM_ID",
                solana_secret_key: "DISTRIBUTION_SOLANA_OPERATOR_SECRET_KEY",
                solana_token_program_id: "DISTRIBUTION_SOLANA_TOKEN_PROGRAM_ID",
            },
            GatewayAction::Signal => FieldNames {
                evm_rpc_url: "SIGNALER_RPC_URL",
                evm_chain_id: "SIGNALER_CHAIN_ID",
                evm_contract: "REPUTATION_ORACLE_ADDRESS",
                evm_private_key: "SIGNALER_PRIVATE_KEY",
                solana_rpc_url: "SIGNAL_SOLANA_RPC_URL",
                solana_program_id: "SIGNAL_SOLANA_PROGRAM_ID",
                solana_secret_key: "SIGNAL_SOLANA_SIGNALER_SECRET_KEY",
                solana_token_program_id: "DISTRIBUTION_SOLANA_TOKEN_PROGRAM_ID",
            },
        }
    }
}

impl std::fmt::Display for GatewayAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of dispatching an action through a gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Gateway disabled, nothing was sent
    Skipped,
    Confirmed { chain: ChainKind, tx: String },
}

pub enum ChainGateway {
    Disabled,
    Contract(ContractGateway),
    Program(ProgramGateway),
}

impl ChainGateway {
    /// Build the gateway for `action`.
    ///
    /// Not enabled, or enabled with required fields missing, yields
    /// [`ChainGateway::Disabled`] (the latter with a warning). A present field
    /// that does not parse is a [`SettlementError::Configuration`].
    pub fn from_config(action: GatewayAction, config: &GatewayConfig, ledger: &Arc<MockLedger>) -> Result<Self> {
        if !config.enabled {
            return Ok(ChainGateway::Disabled);
        }
        let fields = action.fields();

        match config.chain {
            ChainKind::Evm => {
                let contract = &config.contract;
                if !contract.is_complete() {
                    warn!(
                        action = action.label(),
                        has_rpc_url = contract.rpc_url.is_some(),
                        has_chain_id = contract.chain_id.is_some_and(|id| id > 0),
                        has_contract = contract.contract_address.is_some(),
                        has_private_key = contract.private_key.is_some(),
                        "EVM gateway enabled but configuration is incomplete, disabling"
                    );
                    return Ok(ChainGateway::Disabled);
                }
                // is_complete() guarantees every field below is present
                let rpc_url = contract.rpc_url.as_deref().unwrap_or_default();
                let chain_id = contract.chain_id.unwrap_or_default();
                let address = parse_evm_address(
                    contract.contract_address.as_deref().unwrap_or_default(),
                    fields.evm_contract,
                )?;
                let signer = parse_evm_private_key(
                    contract.private_key.as_deref().unwrap_or_default(),
                    fields.evm_private_key,
                )?;

                let rpc: Arc<dyn ContractRpc> = match config.mode {
                    GatewayMode::Mock => ledger.clone(),
                    GatewayMode::Live => Arc::new(
                        AlloyContractRpc::connect(rpc_url, chain_id, address, signer).map_err(|_| {
                            SettlementError::Configuration(format!(
                                "{} must be a valid URL (with {} = {})",
                                fields.evm_rpc_url, fields.evm_chain_id, chain_id
                            ))
                        })?,
                    ),
                };
                Ok(ChainGateway::Contract(ContractGateway::new(rpc, address)))
            }
            ChainKind::Solana => {
                let program = &config.program;
                if !program.is_complete() {
                    warn!(
                        action = action.label(),
                        has_rpc_url = program.rpc_url.is_some(),
                        has_program_id = program.program_id.is_some(),
                        has_secret_key = program.secret_key.is_some(),
                        "Solana gateway enabled but configuration is incomplete, disabling"
                    );
                    return Ok(ChainGateway::Disabled);
                }
                let rpc_url = program.rpc_url.as_deref().unwrap_or_default();
                let program_id = parse_pubkey(
                    program.program_id.as_deref().unwrap_or_default(),
                    fields.solana_program_id,
                )?;
                let signer = parse_solana_keypair(
                    program.secret_key.as_deref().unwrap_or_default(),
                    fields.solana_secret_key,
                )?;
                let token_program = match program.token_program_id.as_deref() {
                    Some(id) if !id.trim().is_empty() => parse_pubkey(id, fields.solana_token_program_id)?,
                    _ => TOKEN_PROGRAM_ID,
                };

                let rpc: Arc<dyn ProgramRpc> = match config.mode {
                    GatewayMode::Mock => ledger.clone(),
                    GatewayMode::Live => {
                        if url_scheme_ok(rpc_url) {
                            Arc::new(LiveProgramRpc::new(rpc_url.to_string(), &program.commitment))
                        } else {
                            return Err(SettlementError::Configuration(format!(
                                "{} must be an http(s) URL",
                                fields.solana_rpc_url
                            )));
                        }
                    }
                };
                Ok(ChainGateway::Program(ProgramGateway::new(
                    rpc,
                    program_id,
                    signer,
                    token_program,
                    program.default_risk_flags,
                )))
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, ChainGateway::Disabled)
    }

    pub fn chain(&self) -> Option<ChainKind> {
        match self {
            ChainGateway::Disabled => None,
            ChainGateway::Contract(_) => Some(ChainKind::Evm),
            ChainGateway::Program(_) => Some(ChainKind::Solana),
        }
    }

    /// Program id of a Solana gateway
    pub fn program_id(&self) -> Option<Pubkey> {
        match self {
            ChainGateway::Program(gateway) => Some(gateway.addresses().program_id()),
            _ => None,
        }
    }

    pub async fn distribute(
        &self,
        agent_id: AgentId,
        amount: &DistributionAmount,
        reference: &TradeReference,
        recipient_override: Option<&str>,
    ) -> Result<DispatchOutcome> {
        match self {
            ChainGateway::Disabled => Ok(DispatchOutcome::Skipped),
            ChainGateway::Contract(gateway) => {
                let tx = gateway
                    .distribute(agent_id, amount, reference, recipient_override)
                    .await?;
                Ok(DispatchOutcome::Confirmed { chain: ChainKind::Evm, tx })
            }
            ChainGateway::Program(gateway) => {
                let signature = gateway
                    .distribute(agent_id, amount, reference, recipient_override)
                    .await?;
                Ok(DispatchOutcome::Confirmed {
                    chain: ChainKind::Solana,
                    tx: signature.to_string(),
                })
            }
        }
    }

    pub async fn submit_signal(
        &self,
        agent_id: AgentId,
        trade: &TradeReference,
        result_hash: &Hash32,
        context_hash: Option<&Hash32>,
        risk_flags: Option<u8>,
    ) -> Result<DispatchOutcome> {
        match self {
            ChainGateway::Disabled => Ok(DispatchOutcome::Skipped),
            ChainGateway::Contract(gateway) => {
                let tx = gateway.submit_signal(agent_id, trade, result_hash).await?;
                Ok(DispatchOutcome::Confirmed { chain: ChainKind::Evm, tx })
            }
            ChainGateway::Program(gateway) => {
                let signature = gateway
                    .submit_signal(agent_id, trade, result_hash, context_hash, risk_flags)
                    .await?;
                Ok(DispatchOutcome::Confirmed {
                    chain: ChainKind::Solana,
                    tx: signature.to_string(),
                })
            }
        }
    }
}

fn url_scheme_ok(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}
