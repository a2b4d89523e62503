//! Account-model gateway (EVM contracts)

use std::sync::Arc;

use alloy::primitives::Address;
use tracing::{debug, info};
use tradegate_core::{AgentId, DistributionAmount, Hash32, TradeReference};

use crate::rpc::ContractRpc;
use crate::Result;

/// One deployed contract (split hub or reputation oracle) behind a
/// [`ContractRpc`].
pub struct ContractGateway {
    rpc: Arc<dyn ContractRpc>,
    contract: Address,
}

impl ContractGateway {
    pub fn new(rpc: Arc<dyn ContractRpc>, contract: Address) -> Self {
        Self { rpc, contract }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// `distributeSettlementToken(agentId, amount, reference)`
    ///
    /// The hub pays out to the recipients registered for the agent, so a
    /// recipient override has no meaning here and is ignored.
    pub async fn distribute(
        &self,
        agent_id: AgentId,
        amount: &DistributionAmount,
        reference: &TradeReference,
        recipient_override: Option<&str>,
    ) -> Result<String> {
        if let Some(account) = recipient_override {
            debug!("Ignoring recipient override {} on EVM distribution", account);
        }
        let tx = self
            .rpc
            .distribute_settlement_token(agent_id, amount.get(), reference)
            .await?;

        info!(
            chain = "evm",
            agent_id = %agent_id,
            amount = %amount,
            tx = %tx,
            "Revenue distributed via settlement token"
        );
        Ok(tx)
    }

    /// `submitSignal(agentId, tradeIdHash, resultHash)`
    ///
    /// The oracle takes no context hash or risk flags.
    pub async fn submit_signal(
        &self,
        agent_id: AgentId,
        trade: &TradeReference,
        result_hash: &Hash32,
    ) -> Result<String> {
        let tx = self.rpc.submit_signal(agent_id, trade, result_hash).await?;

        info!(
            chain = "evm",
            agent_id = %agent_id,
            tx = %tx,
            "Signal submitted onchain"
        );
        Ok(tx)
    }
}
