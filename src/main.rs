//! SWEEPER — unattended Sui balance sweep agent
//!
//! Entry point. Loads configuration and credentials, initialises
//! structured logging, waits for the notification channel, and runs the
//! observe→decide→execute loop until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sweeper::config::{self, Credentials, NotifierKind};
use sweeper::engine::executor::TransferExecutor;
use sweeper::engine::policy::SweepPolicy;
use sweeper::engine::reader::BalanceReader;
use sweeper::engine::sweeper::SweepLoop;
use sweeper::ledger::keys::SuiKeypair;
use sweeper::ledger::sui::SuiRpcClient;
use sweeper::ledger::LedgerClient;
use sweeper::notify::discord::DiscordNotifier;
use sweeper::notify::{Announcer, LogNotifier, Notifier};
use sweeper::types::{format_sui, short_id};

const BANNER: &str = r#"
 ____  _    _ _____ _____ ____  _____ ____
/ ___|| |  | | ____| ____|  _ \| ____|  _ \
\___ \| |/\| |  _| |  _| | |_) |  _| | |_) |
 ___) |  /\  | |___| |___|  __/| |___|  _ <
|____/|_/  \_|_____|_____|_|   |_____|_| \_\

  Unattended Sui balance sweep agent
  v0.1.0
"#;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML, falling back to defaults
    let config_path =
        std::env::var("SWEEPER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let (cfg, from_file) = config::AppConfig::load_or_default(&config_path)?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    if !from_file {
        warn!(path = %config_path, "No config file found, using defaults");
    }

    // -- Credentials -----------------------------------------------------

    let creds = Credentials::from_env(&cfg).context("Missing or invalid credentials")?;
    let keypair = SuiKeypair::from_secret(&creds.private_key).context("Invalid private key")?;
    let address = keypair.address().to_string();

    if address == creds.target_address {
        anyhow::bail!("Target address {} is the swept account itself", creds.target_address);
    }

    let policy_config = cfg.policy_config(&creds.target_address)?;
    info!(
        agent_name = %cfg.agent.name,
        address = %short_id(&address),
        target = %short_id(&creds.target_address),
        threshold = %format_sui(policy_config.threshold),
        reserved_fee = %format_sui(policy_config.reserved_fee),
        mode = %policy_config.mode,
        dry_run = cfg.agent.dry_run,
        "SWEEPER starting up"
    );

    // -- Initialise components -------------------------------------------

    let rpc_url = cfg.rpc_url();
    info!(rpc_url = %rpc_url, "Using Sui RPC endpoint");
    let ledger: Arc<dyn LedgerClient> = Arc::new(SuiRpcClient::new(
        rpc_url,
        keypair,
        Duration::from_secs(cfg.ledger.request_timeout_secs),
    )?);

    let notifier: Box<dyn Notifier> = match (cfg.notifier.kind, creds.discord) {
        (NotifierKind::Discord, Some(discord)) => Box::new(DiscordNotifier::new(
            discord.token,
            discord.channel_id,
            cfg.notifier.ready_attempts,
        )?),
        (NotifierKind::Discord, None) => {
            anyhow::bail!("Discord notifier selected but no Discord credentials were loaded")
        }
        (NotifierKind::Log, _) => {
            info!("Announcements go to the log only");
            Box::new(LogNotifier)
        }
    };
    let announcer = Announcer::new(
        notifier,
        Duration::from_secs(cfg.notifier.send_timeout_secs),
    );

    // The loop does not start until the channel can take messages.
    announcer
        .wait_ready()
        .await
        .context("Notification channel never became ready")?;

    let sweep_loop = SweepLoop::new(
        address,
        BalanceReader::new(ledger.clone(), cfg.sweep.coin_type.clone(), cfg.sweep.page_size),
        SweepPolicy::new(policy_config),
        TransferExecutor::new(ledger, cfg.agent.dry_run),
        announcer,
        cfg.loop_config(),
    );

    // -- Main loop -------------------------------------------------------

    sweep_loop.announce_start().await;
    info!(
        interval_secs = cfg.agent.poll_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );
    sweep_loop.run(shutdown_signal()).await;

    info!("SWEEPER shut down cleanly.");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sweeper=info"));

    let json_logging = std::env::var("SWEEPER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
