//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! field has a default, so a missing file yields a working configuration.
//! Secrets (private key, bot token) and the destination address are
//! referenced by env-var name and resolved at startup into [`Credentials`].

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::engine::policy::{PolicyConfig, SweepMode};
use crate::engine::sweeper::LoopConfig;
use crate::ledger::sui::{MAINNET_RPC_URL, MAX_PAGE_SIZE, SUI_COIN_TYPE};
use crate::types::{
    is_valid_address, sui_to_mist, SweeperError, DEFAULT_RESERVED_FEE_SUI, DEFAULT_THRESHOLD_SUI,
};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub sweep: SweepConfig,
    pub ledger: LedgerConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Sleep between cycles.
    pub poll_interval_secs: u64,
    /// Extra wait after a cycle that moved funds.
    pub settle_delay_secs: u64,
    /// Log transfers instead of submitting them.
    pub dry_run: bool,
    /// Announce every observed change of the total balance.
    pub announce_balance_changes: bool,
    /// Upper bound of the backoff after failed sweeps; 0 disables backoff.
    pub max_backoff_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "SWEEPER-001".to_string(),
            poll_interval_secs: 1,
            settle_delay_secs: 5,
            dry_run: false,
            announce_balance_changes: true,
            max_backoff_secs: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SweepConfig {
    /// Minimum balance (SUI) that must be exceeded to sweep.
    pub threshold_sui: Decimal,
    /// Value (SUI) withheld for gas; also used as the gas budget.
    pub reserved_fee_sui: Decimal,
    pub mode: SweepMode,
    /// Coin objects read per poll (max 100).
    pub page_size: u32,
    pub coin_type: String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            threshold_sui: DEFAULT_THRESHOLD_SUI,
            reserved_fee_sui: DEFAULT_RESERVED_FEE_SUI,
            mode: SweepMode::WholeBalance,
            page_size: MAX_PAGE_SIZE,
            coin_type: SUI_COIN_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    pub rpc_url: String,
    /// Env var that overrides `rpc_url` when set.
    pub rpc_url_env: String,
    pub private_key_env: String,
    pub target_address_env: String,
    pub request_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: MAINNET_RPC_URL.to_string(),
            rpc_url_env: "RPC_URL".to_string(),
            private_key_env: "SUI_PRIVATE_KEY".to_string(),
            target_address_env: "SUI_TARGET_ADDRESS".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Which channel announcements go to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    Discord,
    Log,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
    pub token_env: String,
    pub channel_id_env: String,
    pub send_timeout_secs: u64,
    /// Readiness probes before startup gives up.
    pub ready_attempts: u32,
    /// Explorer link template; `{digest}` is replaced by the tx digest.
    pub explorer_tx_url: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Discord,
            token_env: "DISCORD_TOKEN".to_string(),
            channel_id_env: "DISCORD_CHANNEL_ID".to_string(),
            send_timeout_secs: 5,
            ready_attempts: 5,
            explorer_tx_url: "https://suiscan.xyz/mainnet/tx/{digest}".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    ///
    /// The flag tells whether a file was actually read.
    pub fn load_or_default(path: &str) -> Result<(Self, bool)> {
        if Path::new(path).exists() {
            Ok((Self::load(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    /// Parse and validate TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<(), SweeperError> {
        if self.agent.poll_interval_secs == 0 {
            return Err(SweeperError::Config("agent.poll_interval_secs must be > 0".into()));
        }
        if self.sweep.page_size == 0 || self.sweep.page_size > MAX_PAGE_SIZE {
            return Err(SweeperError::Config(format!(
                "sweep.page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.sweep.coin_type.trim().is_empty() {
            return Err(SweeperError::Config("sweep.coin_type is empty".into()));
        }
        let policy = self.policy_config("0x0")?;
        if policy.reserved_fee == 0 {
            return Err(SweeperError::Config("sweep.reserved_fee_sui must be > 0".into()));
        }
        if self.notifier.send_timeout_secs == 0 {
            return Err(SweeperError::Config("notifier.send_timeout_secs must be > 0".into()));
        }
        if !self.notifier.explorer_tx_url.contains("{digest}") {
            return Err(SweeperError::Config(
                "notifier.explorer_tx_url must contain {digest}".into(),
            ));
        }
        Ok(())
    }

    /// Sweep policy parameters in MIST for the given destination.
    pub fn policy_config(&self, destination: &str) -> Result<PolicyConfig, SweeperError> {
        let threshold = sui_to_mist(self.sweep.threshold_sui).ok_or_else(|| {
            SweeperError::Config(format!("invalid sweep.threshold_sui {}", self.sweep.threshold_sui))
        })?;
        let reserved_fee = sui_to_mist(self.sweep.reserved_fee_sui).ok_or_else(|| {
            SweeperError::Config(format!(
                "invalid sweep.reserved_fee_sui {}",
                self.sweep.reserved_fee_sui
            ))
        })?;
        Ok(PolicyConfig {
            threshold,
            reserved_fee,
            mode: self.sweep.mode,
            destination: destination.to_string(),
        })
    }

    /// RPC endpoint, preferring the override env var.
    pub fn rpc_url(&self) -> String {
        std::env::var(&self.ledger.rpc_url_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.ledger.rpc_url.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.agent.poll_interval_secs)
    }

    /// Timing and announcement settings for the sweep loop.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            poll_interval: self.poll_interval(),
            settle_delay: Duration::from_secs(self.agent.settle_delay_secs),
            max_backoff: Duration::from_secs(self.agent.max_backoff_secs),
            announce_balance_changes: self.agent.announce_balance_changes,
            explorer_tx_url: self.notifier.explorer_tx_url.clone(),
        }
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String, SweeperError> {
        match std::env::var(env_name) {
            Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => Err(SweeperError::Config(format!(
                "environment variable not set: {env_name}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Values supplied through the environment at process start.
///
/// Any missing required value is a fatal startup error.
#[derive(Debug)]
pub struct Credentials {
    pub private_key: SecretString,
    pub target_address: String,
    /// Present only when the Discord notifier is selected.
    pub discord: Option<DiscordCredentials>,
}

#[derive(Debug)]
pub struct DiscordCredentials {
    pub token: SecretString,
    pub channel_id: String,
}

impl Credentials {
    pub fn from_env(cfg: &AppConfig) -> Result<Self, SweeperError> {
        let private_key = SecretString::new(AppConfig::resolve_env(&cfg.ledger.private_key_env)?);

        let target_address = AppConfig::resolve_env(&cfg.ledger.target_address_env)?;
        if !is_valid_address(&target_address) {
            return Err(SweeperError::InvalidAddress(target_address));
        }

        let discord = match cfg.notifier.kind {
            NotifierKind::Discord => {
                let token = SecretString::new(AppConfig::resolve_env(&cfg.notifier.token_env)?);
                let channel_id = AppConfig::resolve_env(&cfg.notifier.channel_id_env)?;
                if channel_id == "0" || !channel_id.chars().all(|c| c.is_ascii_digit()) {
                    return Err(SweeperError::Config(format!(
                        "{} must be a Discord channel snowflake, got {channel_id:?}",
                        cfg.notifier.channel_id_env
                    )));
                }
                Some(DiscordCredentials { token, channel_id })
            }
            NotifierKind::Log => None,
        };

        Ok(Self {
            private_key,
            target_address,
            discord,
        })
    }
}
