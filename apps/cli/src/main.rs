//! TradeGate CLI
//!
//! Operator tooling: derive references and hashes offline, print program
//! addresses, and check a configuration before deploying it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use tradegate_core::{bytes32_hex, trade_reference, AgentId, TradeCommand};
use tradegate_daemon::{build_orchestrator, describe};
use tradegate_logging::init_logging;
use tradegate_settings::{LoggingSettings, Settings};
use tradegate_settlement::{
    associated_token_address, parse_pubkey, ProgramAddresses, Role, TOKEN_PROGRAM_ID,
};

/// TradeGate - dual-chain trade settlement
#[derive(Parser)]
#[command(name = "tradegate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the idempotency reference of a trade id
    TradeRef {
        trade_id: String,
    },

    /// Print the result and context hashes a signal would carry
    Hash {
        /// Agent id as sent by the caller (`7` or `"7"`; the JSON form is hashed)
        #[arg(long)]
        agent_id: String,

        #[arg(long)]
        trade_id: String,

        /// Result object as JSON
        #[arg(long)]
        result: Option<String>,

        /// Context object as JSON
        #[arg(long)]
        context: Option<String>,
    },

    /// Print the program addresses used for an agent
    Addresses {
        #[arg(long)]
        program_id: String,

        #[arg(long)]
        agent_id: u64,

        /// Also derive the receipt and signal addresses for this trade
        #[arg(long)]
        trade_id: Option<String>,

        /// Operator/signaler public key for role assignment addresses
        #[arg(long)]
        signer: Option<String>,

        /// Agent wallet, to derive its settlement token account
        #[arg(long, requires = "mint")]
        wallet: Option<String>,

        /// Settlement mint
        #[arg(long)]
        mint: Option<String>,
    },

    /// Load settings and report which gateways would be enabled
    CheckConfig {
        /// Settings file; the environment is used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let logging = LoggingSettings {
        filter: if cli.verbose { "debug" } else { "warn" }.to_string(),
        ..Default::default()
    };
    init_logging(&logging).map_err(|e| anyhow::anyhow!("{}", e))?;

    match cli.command {
        Commands::TradeRef { trade_id } => {
            println!("{}", trade_reference(&trade_id).to_hex());
        }
        Commands::Hash {
            agent_id,
            trade_id,
            result,
            context,
        } => {
            hash(&agent_id, &trade_id, result.as_deref(), context.as_deref())?;
        }
        Commands::Addresses {
            program_id,
            agent_id,
            trade_id,
            signer,
            wallet,
            mint,
        } => {
            addresses(&program_id, agent_id, trade_id.as_deref(), signer.as_deref(), wallet.zip(mint))?;
        }
        Commands::CheckConfig { config } => {
            check_config(config)?;
        }
    }

    Ok(())
}

fn parse_json(value: &str, what: &str) -> Result<Value> {
    serde_json::from_str(value).with_context(|| format!("{} is not valid JSON", what))
}

fn hash(agent_id: &str, trade_id: &str, result: Option<&str>, context: Option<&str>) -> Result<()> {
    // Bare numbers stay numbers, anything else is hashed as a string
    let agent_literal = serde_json::from_str::<Value>(agent_id).unwrap_or_else(|_| json!(agent_id));

    let mut body = json!({ "agentId": agent_literal, "tradeId": trade_id });
    if let Some(result) = result {
        body["result"] = parse_json(result, "--result")?;
    }
    if let Some(context) = context {
        body["context"] = parse_json(context, "--context")?;
    }
    let command = TradeCommand::from_json(&body)?;

    println!("tradeIdHash: {}", command.trade_reference().to_hex());
    println!("resultHash:  {}", bytes32_hex(&command.resolved_result_hash()));
    println!("contextHash: {}", bytes32_hex(&command.resolved_context_hash()));
    Ok(())
}

fn addresses(
    program_id: &str,
    agent_id: u64,
    trade_id: Option<&str>,
    signer: Option<&str>,
    token_owner: Option<(String, String)>,
) -> Result<()> {
    let addresses = ProgramAddresses::new(parse_pubkey(program_id, "--program-id")?);
    let agent_id = AgentId::new(agent_id);
    let identity = addresses.agent_identity(agent_id)?;

    println!("Program:          {}", addresses.program_id());
    println!("Protocol config:  {}", addresses.protocol_config()?);
    println!("Vault authority:  {}", addresses.vault_authority()?);
    println!("Agent identity:   {}", identity);
    println!("Split config:     {}", addresses.split_config(&identity)?);

    if let Some(signer) = signer {
        let signer = parse_pubkey(signer, "--signer")?;
        println!(
            "Operator role:    {}",
            addresses.role_assignment(Role::RevenueOperator, &signer)?
        );
        println!("Signaler role:    {}", addresses.role_assignment(Role::Signaler, &signer)?);
    }

    if let Some(trade_id) = trade_id {
        let reference = trade_reference(trade_id);
        println!("Trade reference:  {}", reference);
        println!(
            "Receipt:          {}",
            addresses.distribution_receipt(&identity, &reference)?
        );
        println!("Trade signal:     {}", addresses.trade_signal(&identity, &reference)?);
    }

    if let Some((wallet, mint)) = token_owner {
        let wallet = parse_pubkey(&wallet, "--wallet")?;
        let mint = parse_pubkey(&mint, "--mint")?;
        println!(
            "Agent token:      {}",
            associated_token_address(&wallet, &mint, &TOKEN_PROGRAM_ID)?
        );
    }
    Ok(())
}

fn check_config(path: Option<PathBuf>) -> Result<()> {
    let settings = match path {
        Some(path) => Settings::load_from(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Settings::from_env()?,
    };
    let orchestrator = build_orchestrator(&settings)?;

    println!("TradeGate Configuration");
    println!("=======================");
    println!("Mode:          {:?}", settings.mode);
    println!("Listen:        {}:{}", settings.server.host, settings.server.port);
    println!("Amount:        {}", orchestrator.amount());
    println!("Distribution:  {}", describe(orchestrator.distribution_gateway()));
    println!("Signal:        {}", describe(orchestrator.signal_gateway()));
    if settings.distribution.enabled && !orchestrator.distribution_gateway().is_enabled() {
        println!("\nDistribution is enabled but incomplete for chain {}", settings.distribution.chain);
    }
    if settings.signal.enabled && !orchestrator.signal_gateway().is_enabled() {
        println!("Signal submission is enabled but incomplete for chain {}", settings.signal.chain);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_addresses() {
        let cli = Cli::try_parse_from([
            "tradegate",
            "addresses",
            "--program-id",
            "11111111111111111111111111111111",
            "--agent-id",
            "7",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Addresses { agent_id: 7, .. }));
    }

    #[test]
    fn test_wallet_requires_mint() {
        let result = Cli::try_parse_from([
            "tradegate",
            "addresses",
            "--program-id",
            "11111111111111111111111111111111",
            "--agent-id",
            "7",
            "--wallet",
            "11111111111111111111111111111111",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_hash_rejects_bad_json() {
        assert!(hash("7", "trade-42", Some("{oops"), None).is_err());
        assert!(hash("7", "trade-42", Some(r#"{"pnl": 1}"#), None).is_ok());
    }

    #[test]
    fn test_addresses_rejects_bad_program() {
        assert!(addresses("nope", 1, None, None, None).is_err());
    }
}
