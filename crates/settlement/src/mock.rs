//! In-memory ledger for mock mode
//!
//! Simulates just enough of both runtimes for local runs and tests:
//! - program side: account storage, token balances, create-once receipt and
//!   signal accounts, split transfers out of the settlement vault
//! - contract side: the hub's processed-reference set and a log of calls
//!
//! Nothing leaves the process. Signatures and hashes are synthetic.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use tracing::info;
use tradegate_core::{AgentId, Hash32, TradeReference};

use crate::accounts::{AgentIdentity, DistributionReceipt, ProtocolConfig, RevenueSplit, TradeSignal};
use crate::codec::{instruction_discriminator, DISCRIMINATOR_LEN};
use crate::pda::ProgramAddresses;
use crate::rpc::{ContractRpc, ProgramRpc};
use crate::split::SplitBreakdown;
use crate::{Result, SettlementError};

/// Size of an SPL token account, used as placeholder data
const TOKEN_ACCOUNT_LEN: usize = 165;

/// Contract call recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockContractCall {
    Distribution {
        agent_id: AgentId,
        amount: u128,
        reference: TradeReference,
    },
    Signal {
        agent_id: AgentId,
        trade_hash: TradeReference,
        result_hash: Hash32,
    },
}

#[derive(Debug, Default)]
struct MockState {
    /// Program accounts by address
    accounts: HashMap<Pubkey, Vec<u8>>,
    /// Token balances by token account address
    token_balances: HashMap<Pubkey, u64>,
    /// References the hub contract has processed
    contract_references: HashSet<TradeReference>,
    contract_calls: Vec<MockContractCall>,
    /// Transaction counter for generating mock signatures
    tx_counter: u64,
}

#[derive(Debug, Default)]
pub struct MockLedger {
    state: RwLock<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_account(&self, address: Pubkey, data: Vec<u8>) {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        state.accounts.insert(address, data);
    }

    pub fn remove_account(&self, address: &Pubkey) {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        state.accounts.remove(address);
        state.token_balances.remove(address);
    }

    pub fn account_data(&self, address: &Pubkey) -> Option<Vec<u8>> {
        let state = self.state.read().expect("mock ledger lock poisoned");
        state.accounts.get(address).cloned()
    }

    /// Create (or top up) a token account.
    pub fn fund_token_account(&self, address: Pubkey, amount: u64) {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        state
            .accounts
            .entry(address)
            .or_insert_with(|| vec![0u8; TOKEN_ACCOUNT_LEN]);
        *state.token_balances.entry(address).or_insert(0) += amount;
    }

    pub fn token_balance(&self, address: &Pubkey) -> u64 {
        let state = self.state.read().expect("mock ledger lock poisoned");
        state.token_balances.get(address).copied().unwrap_or(0)
    }

    pub fn transaction_count(&self) -> u64 {
        self.state.read().expect("mock ledger lock poisoned").tx_counter
    }

    pub fn contract_calls(&self) -> Vec<MockContractCall> {
        self.state
            .read()
            .expect("mock ledger lock poisoned")
            .contract_calls
            .clone()
    }

    /// Write the protocol config and fund its vault and treasury.
    pub fn install_protocol(
        &self,
        addresses: &ProgramAddresses,
        config: &ProtocolConfig,
        vault_balance: u64,
    ) -> Result<()> {
        self.put_account(addresses.protocol_config()?, config.encode()?);
        self.fund_token_account(config.settlement_vault, vault_balance);
        self.fund_token_account(config.protocol_treasury_token_account, 0);
        info!("[MOCK] Protocol installed for program {}", addresses.program_id());
        Ok(())
    }

    /// Write an agent identity and its revenue split.
    pub fn install_agent(
        &self,
        addresses: &ProgramAddresses,
        agent_id: AgentId,
        identity: &AgentIdentity,
        split: &RevenueSplit,
    ) -> Result<()> {
        let identity_address = addresses.agent_identity(agent_id)?;
        self.put_account(identity_address, identity.encode()?);
        self.put_account(addresses.split_config(&identity_address)?, split.encode()?);
        info!("[MOCK] Agent {} installed", agent_id);
        Ok(())
    }

    fn next_signature(state: &mut MockState) -> Signature {
        state.tx_counter += 1;
        let mut sig = [0u8; 64];
        sig[0..8].copy_from_slice(&state.tx_counter.to_le_bytes());
        sig[8..16].copy_from_slice(b"mocktxn!");
        Signature::from(sig)
    }

    fn next_tx_hash(state: &mut MockState) -> String {
        state.tx_counter += 1;
        let mut hash = [0u8; 32];
        hash[0..8].copy_from_slice(&state.tx_counter.to_le_bytes());
        hash[8..16].copy_from_slice(b"mocktxn!");
        format!("0x{}", hex::encode(hash))
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn apply_distribution(
        state: &mut MockState,
        instruction: &Instruction,
        operator: &Pubkey,
    ) -> Result<()> {
        let data = &instruction.data[DISCRIMINATOR_LEN..];
        if data.len() != 32 + 8 || instruction.accounts.len() != 15 {
            return Err(rejected("malformed distribute_settlement instruction"));
        }
        let mut reference = [0u8; 32];
        reference.copy_from_slice(&data[..32]);
        let mut amount_bytes = [0u8; 8];
        amount_bytes.copy_from_slice(&data[32..40]);
        let amount = u64::from_le_bytes(amount_bytes);

        let key = |i: usize| instruction.accounts[i].pubkey;
        let load = |state: &MockState, i: usize| -> Result<Vec<u8>> {
            state
                .accounts
                .get(&key(i))
                .cloned()
                .ok_or_else(|| rejected(&format!("AccountNotInitialized: {}", key(i))))
        };

        let protocol = ProtocolConfig::decode(&load(state, 0)?)?;
        if protocol.paused {
            return Err(rejected("ProtocolPaused"));
        }
        let identity = AgentIdentity::decode(&load(state, 3)?)?;
        let split = RevenueSplit::decode(&load(state, 4)?)?;
        if amount == 0 {
            return Err(rejected("InvalidAmount"));
        }

        let receipt_address = key(12);
        if state.accounts.contains_key(&receipt_address) {
            return Err(SettlementError::DuplicateReference(format!(
                "Allocate: account {} already in use",
                receipt_address
            )));
        }

        let breakdown = SplitBreakdown::compute(amount, &split, protocol.protocol_fee_bps)
            .map_err(|_| rejected("InvalidBps"))?;

        let vault = key(5);
        let vault_balance = state.token_balances.get(&vault).copied().unwrap_or(0);
        if vault_balance < amount {
            return Err(rejected("insufficient funds in settlement vault"));
        }

        let credits = [
            (key(7), breakdown.agent),
            (key(8), breakdown.platform),
            (key(9), breakdown.referrer),
            (key(10), breakdown.reserve),
            (key(11), breakdown.protocol_fee),
        ];
        for (account, share) in credits {
            if share > 0 && !state.accounts.contains_key(&account) {
                return Err(rejected(&format!("AccountNotInitialized: {}", account)));
            }
        }

        // Staged so an overflowing credit leaves every balance untouched
        let mut updated = HashMap::from([(vault, vault_balance - amount)]);
        for (account, share) in credits {
            if share > 0 {
                let current = match updated.get(&account) {
                    Some(balance) => *balance,
                    None => state.token_balances.get(&account).copied().unwrap_or(0),
                };
                let next = current
                    .checked_add(share)
                    .ok_or_else(|| rejected(&format!("ArithmeticOverflow crediting {}", account)))?;
                updated.insert(account, next);
            }
        }
        state.token_balances.extend(updated);

        let receipt = DistributionReceipt {
            agent: key(3),
            reference,
            amount,
            operator: *operator,
            distributed_at: Self::now(),
        };
        state.accounts.insert(receipt_address, receipt.encode()?);

        info!(
            "[MOCK] Distributed {} for agent #{}: agent={}, platform={}, referrer={}, reserve={}, fee={}",
            amount,
            identity.id,
            breakdown.agent,
            breakdown.platform,
            breakdown.referrer,
            breakdown.reserve,
            breakdown.protocol_fee,
        );
        Ok(())
    }

    fn apply_signal(state: &mut MockState, instruction: &Instruction, signaler: &Pubkey) -> Result<()> {
        let data = &instruction.data[DISCRIMINATOR_LEN..];
        if data.len() != 32 * 3 + 1 || instruction.accounts.len() != 6 {
            return Err(rejected("malformed submit_signal instruction"));
        }
        let bytes32 = |offset: usize| {
            let mut out = [0u8; 32];
            out.copy_from_slice(&data[offset..offset + 32]);
            out
        };

        let config_address = instruction.accounts[0].pubkey;
        let config = state
            .accounts
            .get(&config_address)
            .ok_or_else(|| rejected(&format!("AccountNotInitialized: {}", config_address)))?;
        if ProtocolConfig::decode(config)?.paused {
            return Err(rejected("ProtocolPaused"));
        }

        let identity_address = instruction.accounts[3].pubkey;
        if !state.accounts.contains_key(&identity_address) {
            return Err(rejected(&format!("AccountNotInitialized: {}", identity_address)));
        }

        let signal_address = instruction.accounts[4].pubkey;
        if state.accounts.contains_key(&signal_address) {
            return Err(SettlementError::DuplicateReference(format!(
                "Allocate: account {} already in use",
                signal_address
            )));
        }

        let signal = TradeSignal {
            agent: identity_address,
            trade_id_hash: bytes32(0),
            result_hash: bytes32(32),
            context_hash: bytes32(64),
            reporter: *signaler,
            submitted_at: Self::now(),
            risk_flags: data[96],
            score_submitted: false,
        };
        state.accounts.insert(signal_address, signal.encode()?);
        info!("[MOCK] Signal recorded at {}", signal_address);
        Ok(())
    }
}

fn rejected(reason: &str) -> SettlementError {
    SettlementError::TransactionFailed(format!("[MOCK] {}", reason))
}

#[async_trait]
impl ProgramRpc for MockLedger {
    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>> {
        let state = self.state.read().expect("mock ledger lock poisoned");
        Ok(addresses.iter().map(|a| state.accounts.get(a).cloned()).collect())
    }

    async fn send_instruction(&self, instruction: Instruction, signer: &Keypair) -> Result<Signature> {
        let payer = signer.pubkey();
        let signed = instruction
            .accounts
            .iter()
            .any(|meta| meta.is_signer && meta.pubkey == payer);
        if !signed || instruction.data.len() < DISCRIMINATOR_LEN {
            return Err(rejected("missing signature or instruction data"));
        }

        let mut state = self.state.write().expect("mock ledger lock poisoned");
        let discriminator = &instruction.data[..DISCRIMINATOR_LEN];
        if discriminator == instruction_discriminator("distribute_settlement") {
            Self::apply_distribution(&mut state, &instruction, &payer)?;
        } else if discriminator == instruction_discriminator("submit_signal") {
            Self::apply_signal(&mut state, &instruction, &payer)?;
        } else {
            return Err(rejected("unknown instruction"));
        }
        Ok(Self::next_signature(&mut state))
    }
}

#[async_trait]
impl ContractRpc for MockLedger {
    async fn distribute_settlement_token(
        &self,
        agent_id: AgentId,
        amount: u128,
        reference: &TradeReference,
    ) -> Result<String> {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        if !state.contract_references.insert(*reference) {
            return Err(SettlementError::DuplicateReference(reference.to_hex()));
        }
        state.contract_calls.push(MockContractCall::Distribution {
            agent_id,
            amount,
            reference: *reference,
        });
        info!("[MOCK] distributeSettlementToken: agent={}, amount={}", agent_id, amount);
        Ok(Self::next_tx_hash(&mut state))
    }

    async fn submit_signal(
        &self,
        agent_id: AgentId,
        trade_hash: &TradeReference,
        result_hash: &Hash32,
    ) -> Result<String> {
        let mut state = self.state.write().expect("mock ledger lock poisoned");
        state.contract_calls.push(MockContractCall::Signal {
            agent_id,
            trade_hash: *trade_hash,
            result_hash: *result_hash,
        });
        info!("[MOCK] submitSignal: agent={}", agent_id);
        Ok(Self::next_tx_hash(&mut state))
    }
}
