//! Environment-variable loading
//!
//! Variable names and fallbacks follow the existing deployment:
//! - `SOLANA_RPC_URL` backs both Solana RPC urls
//! - the signal program id defaults to the distribution program id
//! - the signal EVM endpoint and chain id default to `RPC_URL` / `CHAIN_ID`
//! - the distribution amount defaults to `PRICE_PER_TRADE`, then `10000`

use std::str::FromStr;

use tradegate_core::{ChainKind, GatewayMode};

use crate::config::{
    DistributionSettings, EvmSettings, LogFormat, LoggingSettings, ServerSettings, Settings,
    SignalSettings, SolanaSettings,
};
use crate::{Result, SettingsError};

impl Settings {
    /// Load and validate settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary lookup (tests, embedded callers).
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let defaults = Settings::default();

        let distribution_solana_rpc = env.string("DISTRIBUTION_SOLANA_RPC_URL").or_else(|| env.string("SOLANA_RPC_URL"));
        let distribution_program_id = env.string("DISTRIBUTION_SOLANA_PROGRAM_ID");
        let commitment = env
            .string("SOLANA_COMMITMENT")
            .unwrap_or_else(|| defaults.distribution.solana.commitment.clone());

        let settings = Settings {
            server: ServerSettings {
                host: env.string("HOST").unwrap_or(defaults.server.host),
                port: env.number("PORT")?.unwrap_or(defaults.server.port),
            },
            mode: match env.string("GATEWAY_MODE").map(|m| m.to_ascii_lowercase()).as_deref() {
                None | Some("live") => GatewayMode::Live,
                Some("mock") => GatewayMode::Mock,
                Some(_) => return Err(SettingsError::invalid("GATEWAY_MODE", "must be either live or mock")),
            },
            logging: LoggingSettings {
                format: env
                    .string("LOG_FORMAT")
                    .map(|f| LogFormat::from_str(&f))
                    .transpose()?
                    .unwrap_or_default(),
                filter: env.string("LOG_FILTER").unwrap_or(defaults.logging.filter),
            },
            distribution: DistributionSettings {
                enabled: env.flag("DISTRIBUTE_ONCHAIN"),
                chain: env.chain("DISTRIBUTION_CHAIN")?,
                amount: env
                    .string("REVENUE_DISTRIBUTION_AMOUNT")
                    .or_else(|| env.string("PRICE_PER_TRADE"))
                    .unwrap_or(defaults.distribution.amount),
                evm: EvmSettings {
                    rpc_url: env.string("RPC_URL"),
                    chain_id: env.number("CHAIN_ID")?,
                    contract_address: env.string("SPLIT_HUB_ADDRESS"),
                    private_key: env.string("OPERATOR_PRIVATE_KEY"),
                },
                solana: SolanaSettings {
                    rpc_url: distribution_solana_rpc.clone(),
                    program_id: distribution_program_id.clone(),
                    secret_key: env.string("DISTRIBUTION_SOLANA_OPERATOR_SECRET_KEY"),
                    token_program_id: env.string("DISTRIBUTION_SOLANA_TOKEN_PROGRAM_ID"),
                    commitment: commitment.clone(),
                },
            },
            signal: SignalSettings {
                enabled: env.flag("SUBMIT_SIGNAL_ONCHAIN"),
                chain: env.chain("SIGNAL_CHAIN")?,
                evm: EvmSettings {
                    rpc_url: env.string("SIGNALER_RPC_URL").or_else(|| env.string("RPC_URL")),
                    chain_id: match env.number("SIGNALER_CHAIN_ID")? {
                        Some(id) => Some(id),
                        None => env.number("CHAIN_ID")?,
                    },
                    contract_address: env.string("REPUTATION_ORACLE_ADDRESS"),
                    private_key: env.string("SIGNALER_PRIVATE_KEY"),
                },
                solana: SolanaSettings {
                    rpc_url: env.string("SIGNAL_SOLANA_RPC_URL").or(distribution_solana_rpc),
                    program_id: env.string("SIGNAL_SOLANA_PROGRAM_ID").or(distribution_program_id),
                    secret_key: env.string("SIGNAL_SOLANA_SIGNALER_SECRET_KEY"),
                    token_program_id: None,
                    commitment,
                },
                default_risk_flags: env
                    .number::<u8>("SIGNAL_DEFAULT_RISK_FLAGS")
                    .map_err(|_| {
                        SettingsError::invalid("SIGNAL_DEFAULT_RISK_FLAGS", "must be an integer in range [0, 255]")
                    })?
                    .unwrap_or(0),
            },
            config_path: None,
        };

        settings.validate()?;
        Ok(settings)
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Trimmed value, with blank treated as unset
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn flag(&self, key: &str) -> bool {
        self.string(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    fn number<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        self.string(key)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|_| SettingsError::invalid(key, "must be a valid number"))
            })
            .transpose()
    }

    fn chain(&self, key: &str) -> Result<ChainKind> {
        match self.string(key) {
            None => Ok(ChainKind::default()),
            Some(v) => ChainKind::from_str(&v)
                .map_err(|_| SettingsError::invalid(key, "must be either evm or solana")),
        }
    }
}
