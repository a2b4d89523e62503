//! EVM backend over an alloy provider

use alloy::{
    network::EthereumWallet,
    primitives::{Address, FixedBytes, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
    sol_types::SolError,
};
use async_trait::async_trait;
use tracing::info;
use tradegate_core::{AgentId, Hash32, TradeReference};

use crate::rpc::ContractRpc;
use crate::{Result, SettlementError};

sol! {
    #[sol(rpc)]
    interface IRevenueSplitHub {
        error ReferenceAlreadyProcessed();

        function distributeSettlementToken(uint256 agentId, uint256 amount, bytes32 reference) external;
    }
}

sol! {
    #[sol(rpc)]
    interface IReputationOracle {
        function submitSignal(uint256 agentId, bytes32 tradeIdHash, bytes32 resultHash) external;
    }
}

/// Contract calls signed by a local key and sent through an HTTP provider.
pub struct AlloyContractRpc {
    provider: DynProvider,
    contract: Address,
}

impl AlloyContractRpc {
    pub fn connect(rpc_url: &str, chain_id: u64, contract: Address, signer: PrivateKeySigner) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|_| SettlementError::Configuration(format!("invalid EVM RPC url: {}", rpc_url)))?;
        let provider = ProviderBuilder::new()
            .with_chain_id(chain_id)
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        Ok(Self { provider, contract })
    }

    async fn confirm(
        &self,
        pending: std::result::Result<
            alloy::providers::PendingTransactionBuilder<alloy::network::Ethereum>,
            alloy::contract::Error,
        >,
        reference: &TradeReference,
    ) -> Result<String> {
        let pending = pending.map_err(|e| classify_contract_failure(&e, reference))?;
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| SettlementError::RpcError(e.to_string()))?;
        let tx_hash = receipt.transaction_hash.to_string();
        if !receipt.status() {
            return Err(SettlementError::TransactionFailed(format!("transaction {} reverted", tx_hash)));
        }
        info!("Transaction confirmed: {}", tx_hash);
        Ok(tx_hash)
    }
}

#[async_trait]
impl ContractRpc for AlloyContractRpc {
    async fn distribute_settlement_token(
        &self,
        agent_id: AgentId,
        amount: u128,
        reference: &TradeReference,
    ) -> Result<String> {
        let hub = IRevenueSplitHub::new(self.contract, self.provider.clone());
        let pending = hub
            .distributeSettlementToken(
                U256::from(agent_id.get()),
                U256::from(amount),
                FixedBytes::from(*reference.as_bytes()),
            )
            .send()
            .await;
        self.confirm(pending, reference).await
    }

    async fn submit_signal(
        &self,
        agent_id: AgentId,
        trade_hash: &TradeReference,
        result_hash: &Hash32,
    ) -> Result<String> {
        let oracle = IReputationOracle::new(self.contract, self.provider.clone());
        let pending = oracle
            .submitSignal(
                U256::from(agent_id.get()),
                FixedBytes::from(*trade_hash.as_bytes()),
                FixedBytes::from(*result_hash),
            )
            .send()
            .await;
        self.confirm(pending, trade_hash).await
    }
}

/// A revert carrying the `ReferenceAlreadyProcessed()` selector is a reused
/// reference. Anything else is a plain failure.
fn classify_contract_failure(err: &alloy::contract::Error, reference: &TradeReference) -> SettlementError {
    match err.as_revert_data() {
        Some(data) if is_duplicate_revert(&data) => SettlementError::DuplicateReference(reference.to_hex()),
        _ => SettlementError::TransactionFailed(err.to_string()),
    }
}

fn is_duplicate_revert(data: &[u8]) -> bool {
    data.starts_with(&IRevenueSplitHub::ReferenceAlreadyProcessed::SELECTOR)
}
