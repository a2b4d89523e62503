//! Program-model gateway (Solana settlement program)

use std::sync::Arc;

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};
use solana_sdk_ids::system_program;
use tracing::{debug, info};
use tradegate_core::{AgentId, DistributionAmount, Hash32, TradeReference, ZERO_HASH};

use crate::accounts::{AgentIdentity, ProtocolConfig, RevenueSplit};
use crate::codec::{encode_instruction, InstructionArg};
use crate::config::parse_pubkey;
use crate::pda::{associated_token_address, ProgramAddresses, Role};
use crate::rpc::ProgramRpc;
use crate::split::SplitBreakdown;
use crate::{Result, SettlementError};

mod method {
    pub const DISTRIBUTE_SETTLEMENT: &str = "distribute_settlement";
    pub const SUBMIT_SIGNAL: &str = "submit_signal";
}

/// Every account a `distribute_settlement` instruction touches, resolved
/// from live program state, plus the payout the program is expected to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPlan {
    pub protocol_config: Pubkey,
    pub role_assignment: Pubkey,
    pub agent_identity: Pubkey,
    pub split_config: Pubkey,
    pub settlement_vault: Pubkey,
    pub vault_authority: Pubkey,
    pub agent_token: Pubkey,
    pub platform_token: Pubkey,
    pub referrer_token: Pubkey,
    pub reserve_token: Pubkey,
    pub treasury: Pubkey,
    pub receipt: Pubkey,
    pub breakdown: SplitBreakdown,
    /// Accounts that must exist before broadcasting, in check order. Zero-bps
    /// beneficiaries are routed to the vault and never listed here.
    pub required_accounts: Vec<(&'static str, Pubkey)>,
}

pub struct ProgramGateway {
    rpc: Arc<dyn ProgramRpc>,
    addresses: ProgramAddresses,
    signer: Keypair,
    token_program: Pubkey,
    default_risk_flags: u8,
}

impl ProgramGateway {
    pub fn new(
        rpc: Arc<dyn ProgramRpc>,
        program_id: Pubkey,
        signer: Keypair,
        token_program: Pubkey,
        default_risk_flags: u8,
    ) -> Self {
        Self {
            rpc,
            addresses: ProgramAddresses::new(program_id),
            signer,
            token_program,
            default_risk_flags,
        }
    }

    pub fn addresses(&self) -> &ProgramAddresses {
        &self.addresses
    }

    pub fn signer_pubkey(&self) -> Pubkey {
        self.signer.pubkey()
    }

    // ==================== Distribution ====================

    /// Read protocol, identity and split state and resolve every account.
    ///
    /// One batched read for the three state accounts, then one batched
    /// existence check for the token accounts that will receive funds.
    pub async fn plan_distribution(
        &self,
        agent_id: AgentId,
        amount: u64,
        reference: &TradeReference,
        recipient_override: Option<&str>,
    ) -> Result<DistributionPlan> {
        let protocol_config = self.addresses.protocol_config()?;
        let agent_identity = self.addresses.agent_identity(agent_id)?;
        let split_config = self.addresses.split_config(&agent_identity)?;

        let accounts = self
            .rpc
            .get_multiple_accounts(&[protocol_config, agent_identity, split_config])
            .await?;
        let mut accounts = accounts.into_iter();
        let config_data = accounts
            .next()
            .flatten()
            .ok_or_else(|| SettlementError::missing("protocol config", protocol_config))?;
        let identity_data = accounts.next().flatten().ok_or_else(|| {
            SettlementError::missing(format!("agent identity for agentId={}", agent_id), agent_identity)
        })?;
        let split_data = accounts.next().flatten().ok_or_else(|| {
            SettlementError::missing(format!("split config for agentId={}", agent_id), split_config)
        })?;

        let protocol = ProtocolConfig::decode(&config_data)?;
        let identity = AgentIdentity::decode(&identity_data)?;
        let split = RevenueSplit::decode(&split_data)?;

        if protocol.paused {
            return Err(SettlementError::validation("protocol_config", "protocol is paused"));
        }
        let breakdown = SplitBreakdown::compute(amount, &split, protocol.protocol_fee_bps)?;

        let mint = protocol.settlement_mint;
        let vault = protocol.settlement_vault;
        let agent_token = match recipient_override {
            Some(value) => parse_pubkey(value, "recipient_override")
                .map_err(|_| SettlementError::validation("recipient_override", "not a base58 public key"))?,
            None => associated_token_address(&identity.agent_wallet, &mint, &self.token_program)?,
        };
        let beneficiary = |bps: u16, owner: &Pubkey| -> Result<Pubkey> {
            if bps > 0 {
                associated_token_address(owner, &mint, &self.token_program)
            } else {
                Ok(vault)
            }
        };
        let platform_token = beneficiary(split.platform_bps, &split.platform)?;
        let referrer_token = beneficiary(split.referrer_bps, &split.referrer)?;
        let reserve_token = beneficiary(split.reserve_bps, &split.reserve_vault)?;

        let mut required_accounts = vec![
            ("settlement vault", vault),
            ("protocol treasury token account", protocol.protocol_treasury_token_account),
            ("agent token account", agent_token),
        ];
        if split.platform_bps > 0 {
            required_accounts.push(("platform token account", platform_token));
        }
        if split.referrer_bps > 0 {
            required_accounts.push(("referrer token account", referrer_token));
        }
        if split.reserve_bps > 0 {
            required_accounts.push(("reserve token account", reserve_token));
        }

        Ok(DistributionPlan {
            protocol_config,
            role_assignment: self
                .addresses
                .role_assignment(Role::RevenueOperator, &self.signer.pubkey())?,
            agent_identity,
            split_config,
            settlement_vault: vault,
            vault_authority: self.addresses.vault_authority()?,
            agent_token,
            platform_token,
            referrer_token,
            reserve_token,
            treasury: protocol.protocol_treasury_token_account,
            receipt: self.addresses.distribution_receipt(&agent_identity, reference)?,
            breakdown,
            required_accounts,
        })
    }

    /// Fail with the first required account that does not exist.
    async fn ensure_accounts_exist(&self, required: &[(&'static str, Pubkey)]) -> Result<()> {
        let addresses: Vec<Pubkey> = required.iter().map(|(_, address)| *address).collect();
        let found = self.rpc.get_multiple_accounts(&addresses).await?;
        for ((label, address), account) in required.iter().zip(found) {
            if account.is_none() {
                return Err(SettlementError::missing(*label, address));
            }
        }
        Ok(())
    }

    pub fn distribution_instruction(
        &self,
        plan: &DistributionPlan,
        reference: &TradeReference,
        amount: u64,
    ) -> Result<Instruction> {
        let data = encode_instruction(
            method::DISTRIBUTE_SETTLEMENT,
            &[
                InstructionArg::bytes32("reference", reference.as_bytes()),
                InstructionArg::u64("amount", amount),
            ],
        )?;

        Ok(Instruction {
            program_id: self.addresses.program_id(),
            accounts: vec![
                AccountMeta::new_readonly(plan.protocol_config, false),  // protocol_config
                AccountMeta::new(self.signer.pubkey(), true),            // operator (signer + payer)
                AccountMeta::new_readonly(plan.role_assignment, false),  // role_assignment
                AccountMeta::new_readonly(plan.agent_identity, false),   // agent_identity
                AccountMeta::new_readonly(plan.split_config, false),     // split_config
                AccountMeta::new(plan.settlement_vault, false),          // settlement_vault
                AccountMeta::new_readonly(plan.vault_authority, false),  // vault_authority
                AccountMeta::new(plan.agent_token, false),               // agent_token_account
                AccountMeta::new(plan.platform_token, false),            // platform_token_account
                AccountMeta::new(plan.referrer_token, false),            // referrer_token_account
                AccountMeta::new(plan.reserve_token, false),             // reserve_token_account
                AccountMeta::new(plan.treasury, false),                  // protocol_treasury_token_account
                AccountMeta::new(plan.receipt, false),                   // distribution_receipt (init)
                AccountMeta::new_readonly(self.token_program, false),    // token_program
                AccountMeta::new_readonly(system_program::id(), false),  // system_program
            ],
            data,
        })
    }

    /// Distribute `amount` for `agent_id` under `reference`.
    ///
    /// The receipt account derived from (agent identity, reference) is
    /// created by the program, so a reused reference is rejected on-chain.
    pub async fn distribute(
        &self,
        agent_id: AgentId,
        amount: &DistributionAmount,
        reference: &TradeReference,
        recipient_override: Option<&str>,
    ) -> Result<Signature> {
        let amount = amount.as_u64().ok_or_else(|| {
            SettlementError::validation("amount", format!("value {} exceeds u64", amount))
        })?;
        info!("Distributing {} to agent {} (reference {})", amount, agent_id, reference);

        let plan = self
            .plan_distribution(agent_id, amount, reference, recipient_override)
            .await?;
        debug!(
            "Expected payout: agent={}, platform={}, referrer={}, reserve={}, protocol_fee={}",
            plan.breakdown.agent,
            plan.breakdown.platform,
            plan.breakdown.referrer,
            plan.breakdown.reserve,
            plan.breakdown.protocol_fee,
        );
        self.ensure_accounts_exist(&plan.required_accounts).await?;

        let instruction = self.distribution_instruction(&plan, reference, amount)?;
        let signature = self.rpc.send_instruction(instruction, &self.signer).await?;

        info!(
            chain = "solana",
            agent_id = %agent_id,
            tx = %signature,
            "Revenue distributed via settlement instruction"
        );
        Ok(signature)
    }

    // ==================== Signals ====================

    pub fn signal_instruction(
        &self,
        agent_id: AgentId,
        trade: &TradeReference,
        result_hash: &Hash32,
        context_hash: Option<&Hash32>,
        risk_flags: Option<u8>,
    ) -> Result<Instruction> {
        let agent_identity = self.addresses.agent_identity(agent_id)?;
        let data = encode_instruction(
            method::SUBMIT_SIGNAL,
            &[
                InstructionArg::bytes32("trade_id_hash", trade.as_bytes()),
                InstructionArg::bytes32("result_hash", result_hash),
                InstructionArg::bytes32("context_hash", context_hash.unwrap_or(&ZERO_HASH)),
                InstructionArg::u8("risk_flags", risk_flags.unwrap_or(self.default_risk_flags)),
            ],
        )?;

        Ok(Instruction {
            program_id: self.addresses.program_id(),
            accounts: vec![
                AccountMeta::new_readonly(self.addresses.protocol_config()?, false),
                AccountMeta::new(self.signer.pubkey(), true), // signaler (signer + payer)
                AccountMeta::new_readonly(
                    self.addresses.role_assignment(Role::Signaler, &self.signer.pubkey())?,
                    false,
                ),
                AccountMeta::new_readonly(agent_identity, false),
                AccountMeta::new(self.addresses.trade_signal(&agent_identity, trade)?, false), // trade_signal (init)
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data,
        })
    }

    pub async fn submit_signal(
        &self,
        agent_id: AgentId,
        trade: &TradeReference,
        result_hash: &Hash32,
        context_hash: Option<&Hash32>,
        risk_flags: Option<u8>,
    ) -> Result<Signature> {
        let instruction = self.signal_instruction(agent_id, trade, result_hash, context_hash, risk_flags)?;
        let signature = self.rpc.send_instruction(instruction, &self.signer).await?;

        info!(
            chain = "solana",
            agent_id = %agent_id,
            risk_flags = risk_flags.unwrap_or(self.default_risk_flags),
            tx = %signature,
            "Signal submitted onchain"
        );
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLedger;
    use crate::pda::TOKEN_PROGRAM_ID;
    use tradegate_core::trade_reference;

    struct Fixture {
        ledger: Arc<MockLedger>,
        gateway: ProgramGateway,
        protocol: ProtocolConfig,
        identity: AgentIdentity,
        split: RevenueSplit,
    }

    const AGENT: AgentId = AgentId::new(7);

    fn fixture(platform_bps: u16, referrer_bps: u16, reserve_bps: u16) -> Fixture {
        let ledger = Arc::new(MockLedger::new());
        let gateway = ProgramGateway::new(
            ledger.clone(),
            Pubkey::new_unique(),
            Keypair::new(),
            TOKEN_PROGRAM_ID,
            0,
        );
        let protocol = ProtocolConfig {
            admin: Pubkey::new_unique(),
            settlement_mint: Pubkey::new_unique(),
            settlement_vault: Pubkey::new_unique(),
            protocol_treasury_token_account: Pubkey::new_unique(),
            protocol_fee_bps: 0,
            paused: false,
            vault_authority_bump: 255,
        };
        let identity = AgentIdentity {
            id: AGENT.get(),
            owner: Pubkey::new_unique(),
            agent_wallet: Pubkey::new_unique(),
        };
        let split = RevenueSplit {
            agent: gateway.addresses().agent_identity(AGENT).unwrap(),
            platform: Pubkey::new_unique(),
            platform_bps,
            referrer: Pubkey::new_unique(),
            referrer_bps,
            reserve_vault: Pubkey::new_unique(),
            reserve_bps,
        };
        ledger
            .install_protocol(gateway.addresses(), &protocol, 10_000_000)
            .unwrap();
        ledger
            .install_agent(gateway.addresses(), AGENT, &identity, &split)
            .unwrap();
        Fixture { ledger, gateway, protocol, identity, split }
    }

    fn ata(f: &Fixture, owner: &Pubkey) -> Pubkey {
        associated_token_address(owner, &f.protocol.settlement_mint, &TOKEN_PROGRAM_ID).unwrap()
    }

    #[tokio::test]
    async fn test_plan_routes_zero_bps_to_vault() {
        let f = fixture(1000, 500, 0);
        let reference = trade_reference("trade-42");
        let plan = f
            .gateway
            .plan_distribution(AGENT, 1_000_000, &reference, None)
            .await
            .unwrap();

        assert_eq!(plan.agent_token, ata(&f, &f.identity.agent_wallet));
        assert_eq!(plan.platform_token, ata(&f, &f.split.platform));
        assert_eq!(plan.referrer_token, ata(&f, &f.split.referrer));
        assert_eq!(plan.reserve_token, f.protocol.settlement_vault);
        let labels: Vec<&str> = plan.required_accounts.iter().map(|(l, _)| *l).collect();
        assert_eq!(
            labels,
            vec![
                "settlement vault",
                "protocol treasury token account",
                "agent token account",
                "platform token account",
                "referrer token account",
            ]
        );
        assert_eq!(plan.breakdown.agent, 850_000);
    }

    #[tokio::test]
    async fn test_plan_uses_override() {
        let f = fixture(0, 0, 0);
        let custom = Pubkey::new_unique();
        let plan = f
            .gateway
            .plan_distribution(AGENT, 10, &trade_reference("t"), Some(&custom.to_string()))
            .await
            .unwrap();
        assert_eq!(plan.agent_token, custom);

        let err = f
            .gateway
            .plan_distribution(AGENT, 10, &trade_reference("t"), Some("bogus"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Validation { ref field, .. } if field == "recipient_override"));
    }

    #[tokio::test]
    async fn test_missing_state_accounts_are_named() {
        let f = fixture(0, 0, 0);
        let err = f
            .gateway
            .plan_distribution(AgentId::new(99), 10, &trade_reference("t"), None)
            .await
            .unwrap_err();
        match err {
            SettlementError::MissingAccount { label, .. } => {
                assert_eq!(label, "agent identity for agentId=99")
            }
            other => panic!("unexpected {:?}", other),
        }

        f.ledger
            .remove_account(&f.gateway.addresses().protocol_config().unwrap());
        let err = f
            .gateway
            .plan_distribution(AGENT, 10, &trade_reference("t"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Missing protocol config: "));
    }

    #[tokio::test]
    async fn test_paused_protocol_short_circuits() {
        let f = fixture(0, 0, 0);
        let paused = ProtocolConfig { paused: true, ..f.protocol };
        f.ledger
            .install_protocol(f.gateway.addresses(), &paused, 0)
            .unwrap();
        let err = f
            .gateway
            .plan_distribution(AGENT, 10, &trade_reference("t"), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid protocol_config: protocol is paused");
    }

    #[tokio::test]
    async fn test_distribute_requires_agent_token_account() {
        let f = fixture(0, 0, 0);
        let amount = DistributionAmount::new(100).unwrap();
        let err = f
            .gateway
            .distribute(AGENT, &amount, &trade_reference("t"), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SettlementError::missing("agent token account", ata(&f, &f.identity.agent_wallet))
        );
        assert_eq!(f.ledger.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_distribute_then_duplicate() {
        let f = fixture(1000, 500, 0);
        f.ledger.fund_token_account(ata(&f, &f.identity.agent_wallet), 0);
        f.ledger.fund_token_account(ata(&f, &f.split.platform), 0);
        f.ledger.fund_token_account(ata(&f, &f.split.referrer), 0);

        let amount = DistributionAmount::new(1_000_000).unwrap();
        let reference = trade_reference("trade-42");
        f.gateway.distribute(AGENT, &amount, &reference, None).await.unwrap();
        assert_eq!(f.ledger.token_balance(&ata(&f, &f.identity.agent_wallet)), 850_000);

        let second = f.gateway.distribute(AGENT, &amount, &reference, None).await;
        assert!(matches!(second, Err(SettlementError::DuplicateReference(_))));
        assert_eq!(f.ledger.token_balance(&ata(&f, &f.identity.agent_wallet)), 850_000);
    }

    #[tokio::test]
    async fn test_credit_overflow_fails_without_side_effects() {
        let f = fixture(0, 0, 0);
        let agent_token = ata(&f, &f.identity.agent_wallet);
        f.ledger.fund_token_account(agent_token, u64::MAX);

        let amount = DistributionAmount::new(100).unwrap();
        let reference = trade_reference("trade-42");
        let err = f
            .gateway
            .distribute(AGENT, &amount, &reference, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::TransactionFailed(ref m) if m.contains("ArithmeticOverflow")));
        assert_eq!(f.ledger.token_balance(&agent_token), u64::MAX);
        assert_eq!(f.ledger.token_balance(&f.protocol.settlement_vault), 10_000_000);

        let identity = f.gateway.addresses().agent_identity(AGENT).unwrap();
        let receipt = f.gateway.addresses().distribution_receipt(&identity, &reference).unwrap();
        assert!(f.ledger.account_data(&receipt).is_none());
    }

    #[tokio::test]
    async fn test_distribute_rejects_amount_beyond_u64() {
        let f = fixture(0, 0, 0);
        let amount = DistributionAmount::new(u64::MAX as u128 + 1).unwrap();
        let err = f
            .gateway
            .distribute(AGENT, &amount, &trade_reference("t"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Validation { ref field, .. } if field == "amount"));
    }

    #[test]
    fn test_distribution_instruction_account_order() {
        let f = fixture(0, 0, 0);
        let plan = DistributionPlan {
            protocol_config: Pubkey::new_unique(),
            role_assignment: Pubkey::new_unique(),
            agent_identity: Pubkey::new_unique(),
            split_config: Pubkey::new_unique(),
            settlement_vault: Pubkey::new_unique(),
            vault_authority: Pubkey::new_unique(),
            agent_token: Pubkey::new_unique(),
            platform_token: Pubkey::new_unique(),
            referrer_token: Pubkey::new_unique(),
            reserve_token: Pubkey::new_unique(),
            treasury: Pubkey::new_unique(),
            receipt: Pubkey::new_unique(),
            breakdown: SplitBreakdown::default(),
            required_accounts: vec![],
        };
        let ix = f
            .gateway
            .distribution_instruction(&plan, &trade_reference("t"), 5)
            .unwrap();
        assert_eq!(ix.accounts.len(), 15);
        assert_eq!(ix.accounts[0].pubkey, plan.protocol_config);
        assert!(!ix.accounts[0].is_writable);
        assert!(ix.accounts[1].is_signer && ix.accounts[1].is_writable);
        assert_eq!(ix.accounts[12].pubkey, plan.receipt);
        assert!(ix.accounts[12].is_writable);
        assert_eq!(ix.accounts[13].pubkey, TOKEN_PROGRAM_ID);
        assert_eq!(ix.accounts[14].pubkey, system_program::id());
        assert_eq!(ix.data.len(), 8 + 32 + 8);
    }

    #[tokio::test]
    async fn test_signal_defaults_and_duplicate() {
        let f = fixture(0, 0, 0);
        let trade = trade_reference("trade-42");
        let ix = f
            .gateway
            .signal_instruction(AGENT, &trade, &[1; 32], None, None)
            .unwrap();
        assert_eq!(ix.accounts.len(), 6);
        assert_eq!(&ix.data[8..40], trade.as_bytes());
        assert_eq!(&ix.data[72..104], &ZERO_HASH);
        assert_eq!(ix.data[104], 0);

        f.gateway
            .submit_signal(AGENT, &trade, &[1; 32], None, Some(4))
            .await
            .unwrap();
        let identity = f.gateway.addresses().agent_identity(AGENT).unwrap();
        let stored = f
            .ledger
            .account_data(&f.gateway.addresses().trade_signal(&identity, &trade).unwrap())
            .unwrap();
        let signal = crate::accounts::TradeSignal::decode(&stored).unwrap();
        assert_eq!(signal.risk_flags, 4);
        assert_eq!(signal.reporter, f.gateway.signer_pubkey());

        let again = f
            .gateway
            .submit_signal(AGENT, &trade, &[1; 32], None, Some(4))
            .await;
        assert!(matches!(again, Err(SettlementError::DuplicateReference(_))));
    }
}
