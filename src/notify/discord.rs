//! Discord channel notifier.
//!
//! Posts announcements to one channel as a bot user.
//!
//! API docs: https://discord.com/developers/docs/resources/message
//! Base URL: https://discord.com/api/v10
//! Auth: `Authorization: Bot {token}`
//! Limit: message content is capped at 2000 characters.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::Notifier;
use crate::types::SweeperError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://discord.com/api/v10";
const CHANNEL_NAME: &str = "discord";

/// Maximum characters Discord accepts in `content`.
const MAX_CONTENT_CHARS: usize = 2000;

/// Base delay for readiness retries (ms).
const BASE_BACKOFF_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// `GET /users/@me` — the bot's own user.
#[derive(Debug, Deserialize)]
struct BotUser {
    #[serde(default)]
    username: String,
}

/// `GET /channels/{id}`.
#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct DiscordNotifier {
    http: Client,
    base_url: String,
    token: SecretString,
    channel_id: String,
    ready_attempts: u32,
}

impl DiscordNotifier {
    pub fn new(token: SecretString, channel_id: String, ready_attempts: u32) -> Result<Self> {
        Self::with_base_url(BASE_URL, token, channel_id, ready_attempts)
    }

    /// Create a notifier against a different API root (for testing).
    pub fn with_base_url(
        base_url: &str,
        token: SecretString,
        channel_id: String,
        ready_attempts: u32,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("DiscordBot (https://github.com/sweeper, 0.1.0)")
            .build()
            .context("Failed to build HTTP client for Discord")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            channel_id,
            ready_attempts: ready_attempts.max(1),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token.expose_secret())
    }

    /// Authenticated GET returning parsed JSON.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .with_context(|| format!("Discord GET {path} failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SweeperError::Notify {
                channel: CHANNEL_NAME.to_string(),
                message: format!("GET {path} returned {status}: {body}"),
            }
            .into());
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse Discord {path} response"))
    }

    /// One readiness probe: token valid and channel visible.
    async fn probe(&self) -> Result<()> {
        let me: BotUser = self.get("/users/@me").await?;
        let channel: Channel = self.get(&format!("/channels/{}", self.channel_id)).await?;
        info!(
            bot = %me.username,
            channel_id = %channel.id,
            channel = channel.name.as_deref().unwrap_or("?"),
            "Discord notifier ready"
        );
        Ok(())
    }
}

/// Cut `text` to Discord's content limit on a char boundary.
fn truncate_content(text: &str) -> String {
    if text.chars().count() <= MAX_CONTENT_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_CONTENT_CHARS - 1).collect();
    cut.push('…');
    cut
}

// ---------------------------------------------------------------------------
// Notifier trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl Notifier for DiscordNotifier {
    /// Probe until the bot and channel answer, with exponential backoff.
    async fn wait_ready(&self) -> Result<()> {
        let mut last_error = None;

        for attempt in 0..self.ready_attempts {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, "Retrying Discord readiness probe");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.probe().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, error = %format!("{e:#}"), "Discord not ready");
                    last_error = Some(e);
                }
            }
        }

        let cause = last_error.map(|e| format!("{e:#}")).unwrap_or_default();
        anyhow::bail!(
            "Discord channel {} not ready after {} attempts: {cause}",
            self.channel_id,
            self.ready_attempts
        )
    }

    async fn send(&self, text: &str) -> Result<()> {
        let path = format!("/channels/{}/messages", self.channel_id);
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&json!({ "content": truncate_content(text) }))
            .send()
            .await
            .context("Discord message request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SweeperError::Notify {
                channel: CHANNEL_NAME.to_string(),
                message: format!("POST {path} returned {status}: {body}"),
            }
            .into());
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
