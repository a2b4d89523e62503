//! Settings to gateways
//!
//! All gateway construction happens here, once, at startup.

use std::sync::Arc;

use tracing::info;
use tradegate_core::ChainKind;
use tradegate_settings::{EvmSettings, Settings, SolanaSettings};
use tradegate_settlement::{
    ChainGateway, ContractConfig, GatewayAction, GatewayConfig, MockLedger, ProgramConfig,
};

use crate::service::SettlementOrchestrator;
use crate::Result;

fn contract_config(evm: &EvmSettings) -> ContractConfig {
    ContractConfig {
        rpc_url: evm.rpc_url.clone(),
        chain_id: evm.chain_id,
        contract_address: evm.contract_address.clone(),
        private_key: evm.private_key.clone(),
    }
}

fn program_config(solana: &SolanaSettings, default_risk_flags: u8) -> ProgramConfig {
    ProgramConfig {
        rpc_url: solana.rpc_url.clone(),
        program_id: solana.program_id.clone(),
        secret_key: solana.secret_key.clone(),
        token_program_id: solana.token_program_id.clone(),
        commitment: solana.commitment.clone(),
        default_risk_flags,
    }
}

pub fn distribution_config(settings: &Settings) -> GatewayConfig {
    let dist = &settings.distribution;
    GatewayConfig {
        enabled: dist.enabled,
        chain: dist.chain,
        mode: settings.mode,
        contract: contract_config(&dist.evm),
        program: program_config(&dist.solana, 0),
    }
}

pub fn signal_config(settings: &Settings) -> GatewayConfig {
    let signal = &settings.signal;
    GatewayConfig {
        enabled: signal.enabled,
        chain: signal.chain,
        mode: settings.mode,
        contract: contract_config(&signal.evm),
        program: program_config(&signal.solana, signal.default_risk_flags),
    }
}

/// Build the orchestrator with a fresh in-memory ledger backing mock mode.
pub fn build_orchestrator(settings: &Settings) -> Result<SettlementOrchestrator> {
    build_orchestrator_with_ledger(settings, Arc::new(MockLedger::new()))
}

/// Build the orchestrator. Both gateways share `ledger` when in mock mode.
pub fn build_orchestrator_with_ledger(
    settings: &Settings,
    ledger: Arc<MockLedger>,
) -> Result<SettlementOrchestrator> {
    let amount = settings.distribution.amount()?;
    let distribution =
        ChainGateway::from_config(GatewayAction::Distribution, &distribution_config(settings), &ledger)?;
    let signal = ChainGateway::from_config(GatewayAction::Signal, &signal_config(settings), &ledger)?;

    info!(
        mode = ?settings.mode,
        distribution = describe(&distribution),
        signal = describe(&signal),
        amount = %amount,
        "Gateways configured"
    );
    Ok(SettlementOrchestrator::new(amount, distribution, signal))
}

/// Short form for logs and `check-config`
pub fn describe(gateway: &ChainGateway) -> &'static str {
    match gateway.chain() {
        None => "disabled",
        Some(ChainKind::Evm) => "evm",
        Some(ChainKind::Solana) => "solana",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradegate_core::GatewayMode;

    const PROGRAM: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    #[test]
    fn test_signal_risk_flags_reach_program_config() {
        let mut settings = Settings::default();
        settings.signal.default_risk_flags = 9;
        settings.signal.solana.program_id = Some(PROGRAM.to_string());
        let config = signal_config(&settings);
        assert_eq!(config.program.default_risk_flags, 9);
        assert_eq!(config.program.program_id.as_deref(), Some(PROGRAM));
        assert_eq!(distribution_config(&settings).program.default_risk_flags, 0);
    }

    #[test]
    fn test_default_settings_build_disabled_gateways() {
        let orchestrator = build_orchestrator(&Settings::default()).unwrap();
        assert!(!orchestrator.distribution_gateway().is_enabled());
        assert!(!orchestrator.signal_gateway().is_enabled());
        assert_eq!(orchestrator.amount().get(), 10_000);
    }

    #[test]
    fn test_mock_mode_evm_gateways() {
        let mut settings = Settings::default();
        settings.mode = GatewayMode::Mock;
        settings.distribution.enabled = true;
        settings.distribution.evm = EvmSettings {
            rpc_url: Some("http://localhost:8545".to_string()),
            chain_id: Some(31337),
            contract_address: Some("0x00000000000000000000000000000000000000aa".to_string()),
            private_key: Some(format!("0x{}", "22".repeat(32))),
        };
        let orchestrator = build_orchestrator(&settings).unwrap();
        assert_eq!(describe(orchestrator.distribution_gateway()), "evm");
        assert_eq!(describe(orchestrator.signal_gateway()), "disabled");
    }
}
