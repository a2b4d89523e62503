//! Integration tests for the post-trade settlement flow
//!
//! Runs the orchestrator built from settings against the in-memory ledger:
//! 1. Solana distribution with split payout and signal recording
//! 2. Duplicate references rejected per action, independently
//! 3. Zero-bps beneficiaries and recipient override
//! 4. Missing accounts and disabled gateways
//! 5. EVM contracts in mock mode

use std::sync::Arc;

use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use tradegate_core::{AgentId, ChainKind, GatewayMode, TradeCommand};
use tradegate_daemon::{build_orchestrator_with_ledger, ActionOutcome, SettlementOrchestrator};
use tradegate_settings::{EvmSettings, Settings, SolanaSettings};
use tradegate_settlement::{
    associated_token_address, AgentIdentity, MockContractCall, MockLedger, ProgramAddresses,
    ProtocolConfig, RevenueSplit, TradeSignal, TOKEN_PROGRAM_ID,
};

// =============================================================================
// HELPERS
// =============================================================================

const VAULT_FUNDS: u64 = 10_000_000;

struct SolanaWorld {
    ledger: Arc<MockLedger>,
    addresses: ProgramAddresses,
    protocol: ProtocolConfig,
    program_id: Pubkey,
    operator: Keypair,
    signaler: Keypair,
}

impl SolanaWorld {
    fn new() -> Self {
        let program_id = Pubkey::new_unique();
        let protocol = ProtocolConfig {
            admin: Pubkey::new_unique(),
            settlement_mint: Pubkey::new_unique(),
            settlement_vault: Pubkey::new_unique(),
            protocol_treasury_token_account: Pubkey::new_unique(),
            protocol_fee_bps: 0,
            paused: false,
            vault_authority_bump: 254,
        };
        let world = Self {
            ledger: Arc::new(MockLedger::new()),
            addresses: ProgramAddresses::new(program_id),
            protocol,
            program_id,
            operator: Keypair::new(),
            signaler: Keypair::new(),
        };
        world
            .ledger
            .install_protocol(&world.addresses, &world.protocol, VAULT_FUNDS)
            .unwrap();
        world
    }

    /// Register an agent and return its wallet and split
    fn add_agent(&self, id: u64, platform_bps: u16, referrer_bps: u16, reserve_bps: u16) -> (Pubkey, RevenueSplit) {
        let agent_id = AgentId::new(id);
        let wallet = Pubkey::new_unique();
        let identity = AgentIdentity {
            id,
            owner: Pubkey::new_unique(),
            agent_wallet: wallet,
        };
        let split = RevenueSplit {
            agent: self.addresses.agent_identity(agent_id).unwrap(),
            platform: Pubkey::new_unique(),
            platform_bps,
            referrer: Pubkey::new_unique(),
            referrer_bps,
            reserve_vault: Pubkey::new_unique(),
            reserve_bps,
        };
        self.ledger
            .install_agent(&self.addresses, agent_id, &identity, &split)
            .unwrap();
        (wallet, split)
    }

    fn token_account(&self, owner: &Pubkey) -> Pubkey {
        associated_token_address(owner, &self.protocol.settlement_mint, &TOKEN_PROGRAM_ID).unwrap()
    }

    fn open_token_account(&self, owner: &Pubkey) -> Pubkey {
        let account = self.token_account(owner);
        self.ledger.fund_token_account(account, 0);
        account
    }

    fn balance_of(&self, owner: &Pubkey) -> u64 {
        self.ledger.token_balance(&self.token_account(owner))
    }

    fn settings(&self, amount: &str) -> Settings {
        let mut settings = Settings::default();
        settings.mode = GatewayMode::Mock;

        settings.distribution.enabled = true;
        settings.distribution.chain = ChainKind::Solana;
        settings.distribution.amount = amount.to_string();
        settings.distribution.solana = SolanaSettings {
            rpc_url: Some("http://localhost:8899".to_string()),
            program_id: Some(self.program_id.to_string()),
            secret_key: Some(bs58::encode(self.operator.to_bytes()).into_string()),
            ..Default::default()
        };

        settings.signal.enabled = true;
        settings.signal.chain = ChainKind::Solana;
        settings.signal.default_risk_flags = 2;
        settings.signal.solana = SolanaSettings {
            rpc_url: Some("http://localhost:8899".to_string()),
            program_id: Some(self.program_id.to_string()),
            secret_key: Some(serde_json::to_string(&self.signaler.to_bytes().to_vec()).unwrap()),
            ..Default::default()
        };
        settings
    }

    fn orchestrator(&self, settings: &Settings) -> SettlementOrchestrator {
        build_orchestrator_with_ledger(settings, self.ledger.clone()).unwrap()
    }

    fn stored_signal(&self, agent: u64, trade_id: &str) -> Option<TradeSignal> {
        let identity = self.addresses.agent_identity(AgentId::new(agent)).unwrap();
        let reference = tradegate_core::trade_reference(trade_id);
        let address = self.addresses.trade_signal(&identity, &reference).unwrap();
        self.ledger
            .account_data(&address)
            .map(|data| TradeSignal::decode(&data).unwrap())
    }
}

fn command(body: serde_json::Value) -> TradeCommand {
    TradeCommand::from_json(&body).unwrap()
}

fn failure(outcome: &ActionOutcome) -> &str {
    match outcome {
        ActionOutcome::Failed(message) => message,
        other => panic!("expected failure, got {:?}", other),
    }
}

// =============================================================================
// 1. Solana end-to-end
// =============================================================================

#[tokio::test]
async fn test_solana_distribution_and_signal() {
    let world = SolanaWorld::new();
    let (wallet, split) = world.add_agent(7, 1000, 500, 0);
    world.open_token_account(&wallet);
    world.open_token_account(&split.platform);
    world.open_token_account(&split.referrer);

    let orchestrator = world.orchestrator(&world.settings("1000000"));
    let cmd = command(json!({"agentId": 7, "tradeId": "trade-42", "result": {"pnl": 12}}));
    let expected_result = cmd.resolved_result_hash();
    let expected_context = cmd.resolved_context_hash();

    let (ack, actions) = orchestrator.execute_trade_tracked(cmd);
    assert!(ack.ok);
    assert_eq!(ack.agent_id, json!(7));

    let report = actions.join().await;
    assert!(matches!(report.distribution, ActionOutcome::Completed { chain: ChainKind::Solana, .. }));
    assert!(matches!(report.signal, ActionOutcome::Completed { chain: ChainKind::Solana, .. }));

    assert_eq!(world.balance_of(&wallet), 850_000);
    assert_eq!(world.balance_of(&split.platform), 100_000);
    assert_eq!(world.balance_of(&split.referrer), 50_000);
    assert_eq!(
        world.ledger.token_balance(&world.protocol.settlement_vault),
        VAULT_FUNDS - 1_000_000
    );

    let signal = world.stored_signal(7, "trade-42").unwrap();
    assert_eq!(signal.result_hash, expected_result);
    assert_eq!(signal.context_hash, expected_context);
    assert_eq!(signal.risk_flags, 2);
    assert_eq!(signal.reporter, world.signaler.pubkey());
}

#[tokio::test]
async fn test_risk_flags_from_request_override_default() {
    let world = SolanaWorld::new();
    world.add_agent(3, 0, 0, 0);

    let orchestrator = world.orchestrator(&world.settings("100"));
    let (_, actions) =
        orchestrator.execute_trade_tracked(command(json!({"agentId": 3, "tradeId": "t-1", "riskFlags": 9})));
    let report = actions.join().await;

    // No agent token account, so only the signal lands
    assert!(failure(&report.distribution).starts_with("Missing agent token account"));
    assert!(matches!(report.signal, ActionOutcome::Completed { .. }));
    assert_eq!(world.stored_signal(3, "t-1").unwrap().risk_flags, 9);
}

// =============================================================================
// 2. Duplicate references
// =============================================================================

#[tokio::test]
async fn test_resubmitted_trade_is_rejected_without_double_payout() {
    let world = SolanaWorld::new();
    let (wallet, split) = world.add_agent(7, 1000, 500, 0);
    world.open_token_account(&wallet);
    world.open_token_account(&split.platform);
    world.open_token_account(&split.referrer);
    let orchestrator = world.orchestrator(&world.settings("1000000"));

    let first = orchestrator
        .execute_trade_tracked(command(json!({"agentId": 7, "tradeId": "trade-42"})))
        .1
        .join()
        .await;
    assert!(!first.distribution.is_failed());
    let txs_after_first = world.ledger.transaction_count();

    let (ack, actions) = orchestrator.execute_trade_tracked(command(json!({"agentId": 7, "tradeId": "trade-42"})));
    assert!(ack.ok);
    let second = actions.join().await;
    assert!(failure(&second.distribution).starts_with("Reference already processed"));
    assert!(failure(&second.signal).starts_with("Reference already processed"));

    assert_eq!(world.balance_of(&wallet), 850_000);
    assert_eq!(world.ledger.transaction_count(), txs_after_first);

    // A new trade id is a new reference
    let third = orchestrator
        .execute_trade_tracked(command(json!({"agentId": 7, "tradeId": "trade-43"})))
        .1
        .join()
        .await;
    assert!(!third.distribution.is_failed());
    assert_eq!(world.balance_of(&wallet), 1_700_000);
}

// =============================================================================
// 3. Beneficiary routing
// =============================================================================

#[tokio::test]
async fn test_zero_bps_beneficiaries_need_no_token_account() {
    let world = SolanaWorld::new();
    let (wallet, split) = world.add_agent(11, 2500, 0, 0);
    world.open_token_account(&wallet);
    world.open_token_account(&split.platform);
    // referrer and reserve token accounts are never created

    let orchestrator = world.orchestrator(&world.settings("10000"));
    let report = orchestrator
        .execute_trade_tracked(command(json!({"agentId": 11, "tradeId": "zero-bps"})))
        .1
        .join()
        .await;

    assert!(matches!(report.distribution, ActionOutcome::Completed { .. }));
    assert_eq!(world.balance_of(&wallet), 7_500);
    assert_eq!(world.balance_of(&split.platform), 2_500);
    assert_eq!(world.ledger.token_balance(&world.protocol.settlement_vault), VAULT_FUNDS - 10_000);
}

#[tokio::test]
async fn test_missing_nonzero_beneficiary_account_fails() {
    let world = SolanaWorld::new();
    let (wallet, split) = world.add_agent(12, 1000, 500, 0);
    world.open_token_account(&wallet);
    world.open_token_account(&split.platform);

    let orchestrator = world.orchestrator(&world.settings("10000"));
    let report = orchestrator
        .execute_trade_tracked(command(json!({"agentId": 12, "tradeId": "t"})))
        .1
        .join()
        .await;

    let message = failure(&report.distribution);
    assert_eq!(
        message,
        format!("Missing referrer token account: {}", world.token_account(&split.referrer))
    );
    assert_eq!(world.balance_of(&wallet), 0);
}

#[tokio::test]
async fn test_recipient_override_receives_agent_share() {
    let world = SolanaWorld::new();
    let (wallet, _) = world.add_agent(5, 0, 0, 0);
    let custom = Pubkey::new_unique();
    world.ledger.fund_token_account(custom, 0);

    let orchestrator = world.orchestrator(&world.settings("4000"));
    let report = orchestrator
        .execute_trade_tracked(command(json!({
            "agentId": "5",
            "tradeId": "override",
            "solanaAgentTokenAccount": custom.to_string(),
        })))
        .1
        .join()
        .await;

    assert!(matches!(report.distribution, ActionOutcome::Completed { .. }));
    assert_eq!(world.ledger.token_balance(&custom), 4_000);
    assert_eq!(world.balance_of(&wallet), 0);
}

// =============================================================================
// 4. Missing state and disabled gateways
// =============================================================================

#[tokio::test]
async fn test_unknown_agent_is_named() {
    let world = SolanaWorld::new();
    let orchestrator = world.orchestrator(&world.settings("10000"));
    let report = orchestrator
        .execute_trade_tracked(command(json!({"agentId": 8, "tradeId": "t"})))
        .1
        .join()
        .await;

    assert!(failure(&report.distribution).starts_with("Missing agent identity for agentId=8"));
    // The signal program rejects an unregistered identity on its own
    assert!(report.signal.is_failed());
}

#[tokio::test]
async fn test_paused_protocol_blocks_distribution_only() {
    let world = SolanaWorld::new();
    let (wallet, _) = world.add_agent(4, 0, 0, 0);
    world.open_token_account(&wallet);
    let orchestrator = world.orchestrator(&world.settings("10000"));

    let paused = ProtocolConfig { paused: true, ..world.protocol };
    world.ledger.install_protocol(&world.addresses, &paused, 0).unwrap();

    let report = orchestrator
        .execute_trade_tracked(command(json!({"agentId": 4, "tradeId": "t"})))
        .1
        .join()
        .await;
    assert_eq!(
        failure(&report.distribution),
        "Invalid protocol_config: protocol is paused"
    );
    assert!(report.signal.is_failed());
    assert_eq!(world.balance_of(&wallet), 0);
}

#[tokio::test]
async fn test_disabled_gateways_do_nothing() {
    let ledger = Arc::new(MockLedger::new());
    let mut settings = Settings::default();
    settings.mode = GatewayMode::Mock;
    // Enabled, but no credentials: degrades to disabled
    settings.signal.enabled = true;

    let orchestrator = build_orchestrator_with_ledger(&settings, ledger.clone()).unwrap();
    assert!(!orchestrator.signal_gateway().is_enabled());

    let report = orchestrator
        .execute_trade_tracked(command(json!({"agentId": 1, "tradeId": "t"})))
        .1
        .join()
        .await;
    assert_eq!(report.distribution, ActionOutcome::Skipped);
    assert_eq!(report.signal, ActionOutcome::Skipped);
    assert_eq!(ledger.transaction_count(), 0);
    assert!(ledger.contract_calls().is_empty());
}

#[test]
fn test_malformed_credentials_fail_construction() {
    let world = SolanaWorld::new();
    let mut settings = world.settings("10000");
    settings.signal.solana.secret_key = Some("[1,2,3]".to_string());
    assert!(build_orchestrator_with_ledger(&settings, world.ledger.clone()).is_err());
}

// =============================================================================
// 5. EVM contracts (mock)
// =============================================================================

fn evm_settings() -> Settings {
    let mut settings = Settings::default();
    settings.mode = GatewayMode::Mock;
    settings.distribution.enabled = true;
    settings.distribution.amount = "10000".to_string();
    settings.distribution.evm = EvmSettings {
        rpc_url: Some("http://localhost:8545".to_string()),
        chain_id: Some(84532),
        contract_address: Some("0x00000000000000000000000000000000000000a1".to_string()),
        private_key: Some(format!("0x{}", "01".repeat(32))),
    };
    settings.signal.enabled = true;
    settings.signal.evm = EvmSettings {
        contract_address: Some("0x00000000000000000000000000000000000000b2".to_string()),
        private_key: Some(format!("0x{}", "02".repeat(32))),
        ..settings.distribution.evm.clone()
    };
    settings
}

#[tokio::test]
async fn test_evm_duplicate_distribution_signal_unaffected() {
    let ledger = Arc::new(MockLedger::new());
    let orchestrator = build_orchestrator_with_ledger(&evm_settings(), ledger.clone()).unwrap();

    let first = orchestrator
        .execute_trade_tracked(command(json!({"agentId": 7, "tradeId": "trade-42"})))
        .1
        .join()
        .await;
    assert!(matches!(first.distribution, ActionOutcome::Completed { chain: ChainKind::Evm, .. }));
    assert!(matches!(first.signal, ActionOutcome::Completed { chain: ChainKind::Evm, .. }));

    let second = orchestrator
        .execute_trade_tracked(command(json!({"agentId": 7, "tradeId": "trade-42"})))
        .1
        .join()
        .await;
    assert!(failure(&second.distribution).starts_with("Reference already processed"));
    assert!(matches!(second.signal, ActionOutcome::Completed { .. }));

    let calls = ledger.contract_calls();
    let distributions = calls
        .iter()
        .filter(|c| matches!(c, MockContractCall::Distribution { .. }))
        .count();
    let signals = calls
        .iter()
        .filter(|c| matches!(c, MockContractCall::Signal { .. }))
        .count();
    assert_eq!(distributions, 1);
    assert_eq!(signals, 2);
}

#[tokio::test]
async fn test_evm_calls_carry_reference_and_amount() {
    let ledger = Arc::new(MockLedger::new());
    let orchestrator = build_orchestrator_with_ledger(&evm_settings(), ledger.clone()).unwrap();
    let cmd = command(json!({"agentId": 21, "tradeId": "evm-1"}));
    let reference = cmd.trade_reference();
    let result_hash = cmd.resolved_result_hash();

    orchestrator.execute_trade_tracked(cmd).1.join().await;

    let calls = ledger.contract_calls();
    assert!(calls.contains(&MockContractCall::Distribution {
        agent_id: AgentId::new(21),
        amount: 10_000,
        reference,
    }));
    assert!(calls.contains(&MockContractCall::Signal {
        agent_id: AgentId::new(21),
        trade_hash: reference,
        result_hash,
    }));
}
