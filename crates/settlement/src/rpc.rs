//! Transport seams for the two runtimes
//!
//! Gateways only ever talk to these traits, so the live endpoints and the
//! in-memory [`MockLedger`](crate::MockLedger) are interchangeable.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use tracing::{debug, info};
use tradegate_core::{AgentId, Hash32, TradeReference};

use crate::{Result, SettlementError};

/// Program-model runtime access
#[async_trait]
pub trait ProgramRpc: Send + Sync {
    /// One batched read. `None` marks an address with no account.
    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Sign, broadcast and wait for confirmation.
    async fn send_instruction(&self, instruction: Instruction, signer: &Keypair) -> Result<Signature>;
}

/// Account-model runtime access, bound to one contract address.
///
/// Both calls return the transaction hash once the receipt is in.
#[async_trait]
pub trait ContractRpc: Send + Sync {
    async fn distribute_settlement_token(
        &self,
        agent_id: AgentId,
        amount: u128,
        reference: &TradeReference,
    ) -> Result<String>;

    async fn submit_signal(
        &self,
        agent_id: AgentId,
        trade_hash: &TradeReference,
        result_hash: &Hash32,
    ) -> Result<String>;
}

/// Solana JSON-RPC backend
pub struct LiveProgramRpc {
    client: RpcClient,
}

impl LiveProgramRpc {
    pub fn new(rpc_url: String, commitment: &str) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url, commitment_config(commitment)),
        }
    }
}

fn commitment_config(commitment: &str) -> CommitmentConfig {
    match commitment {
        "finalized" => CommitmentConfig::finalized(),
        "confirmed" => CommitmentConfig::confirmed(),
        "processed" => CommitmentConfig::processed(),
        _ => CommitmentConfig::confirmed(),
    }
}

#[async_trait]
impl ProgramRpc for LiveProgramRpc {
    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>> {
        debug!("Fetching {} accounts", addresses.len());
        let accounts = self
            .client
            .get_multiple_accounts(addresses)
            .await
            .map_err(|e| SettlementError::RpcError(e.to_string()))?;
        Ok(accounts.into_iter().map(|a| a.map(|account| account.data)).collect())
    }

    async fn send_instruction(&self, instruction: Instruction, signer: &Keypair) -> Result<Signature> {
        let blockhash = self
            .client
            .get_latest_blockhash()
            .await
            .map_err(|e| SettlementError::RpcError(e.to_string()))?;

        let tx = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&signer.pubkey()),
            &[signer],
            blockhash,
        );

        let signature = self
            .client
            .send_and_confirm_transaction(&tx)
            .await
            .map_err(|e| classify_program_failure(e.to_string()))?;

        info!("Transaction confirmed: {}", signature);
        Ok(signature)
    }
}

/// The receipt and signal accounts are created by the instruction, so a
/// reused reference fails in the system program with "already in use".
/// A bare custom error 0x0 is not enough: the token program reports
/// `NotRentExempt` with the same code.
pub(crate) fn classify_program_failure(message: String) -> SettlementError {
    if message.contains("already in use") {
        SettlementError::DuplicateReference(message)
    } else {
        SettlementError::TransactionFailed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_already_in_use() {
        let err = classify_program_failure(
            "Transaction simulation failed: Allocate: account Address { address: 9x..., base: None } already in use"
                .to_string(),
        );
        assert!(matches!(err, SettlementError::DuplicateReference(_)));
    }

    #[test]
    fn test_classify_token_error_zero_is_not_duplicate() {
        let err = classify_program_failure(
            "Error processing Instruction 0: custom program error: 0x0".to_string(),
        );
        assert!(matches!(err, SettlementError::TransactionFailed(_)));
    }

    #[test]
    fn test_classify_other_failures() {
        let err = classify_program_failure(
            "Error processing Instruction 0: custom program error: 0x1771".to_string(),
        );
        assert!(matches!(err, SettlementError::TransactionFailed(_)));
    }

    #[test]
    fn test_commitment_fallback() {
        assert_eq!(commitment_config("finalized"), CommitmentConfig::finalized());
        assert_eq!(commitment_config("bogus"), CommitmentConfig::confirmed());
    }
}
