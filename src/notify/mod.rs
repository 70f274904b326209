//! Notification channels.
//!
//! Defines the `Notifier` trait and provides implementations for:
//! - Discord — bot messages to a fixed channel (REST API)
//! - Log — announcements written to the tracing log only
//!
//! The loop never talks to a `Notifier` directly; it goes through
//! [`Announcer`], which bounds each send with a timeout and turns every
//! failure into a logged [`Delivery::Dropped`].

pub mod discord;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Abstraction over announcement channels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Block until the channel can accept messages. Awaited once at startup.
    async fn wait_ready(&self) -> Result<()>;

    /// Deliver one message.
    async fn send(&self, text: &str) -> Result<()>;
}

/// Result of a best-effort announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped(String),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// Best-effort, time-bounded front end over a [`Notifier`].
pub struct Announcer {
    notifier: Box<dyn Notifier>,
    timeout: Duration,
}

impl Announcer {
    pub fn new(notifier: Box<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Wait for the channel's readiness gate.
    pub async fn wait_ready(&self) -> Result<()> {
        self.notifier.wait_ready().await
    }

    /// Send `message`, never failing the caller.
    pub async fn announce(&self, message: &str) -> Delivery {
        match tokio::time::timeout(self.timeout, self.notifier.send(message)).await {
            Ok(Ok(())) => {
                debug!("Announcement delivered");
                Delivery::Delivered
            }
            Ok(Err(e)) => {
                let reason = format!("{e:#}");
                warn!(error = %reason, "Announcement dropped");
                Delivery::Dropped(reason)
            }
            Err(_) => {
                let reason = format!("timed out after {:?}", self.timeout);
                warn!(timeout = ?self.timeout, "Announcement dropped: send timed out");
                Delivery::Dropped(reason)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Log notifier
// ---------------------------------------------------------------------------

/// Writes announcements to the log. Always ready, never fails.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn wait_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<()> {
        info!(target: "sweeper::announce", "{text}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivered() {
        let mut mock = MockNotifier::new();
        mock.expect_send().times(1).returning(|_| Ok(()));
        let announcer = Announcer::new(Box::new(mock), Duration::from_secs(1));
        assert_eq!(announcer.announce("hello").await, Delivery::Delivered);
    }

    #[tokio::test]
    async fn test_send_error_is_swallowed() {
        let mut mock = MockNotifier::new();
        mock.expect_send()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("channel not found")));
        let announcer = Announcer::new(Box::new(mock), Duration::from_secs(1));

        let delivery = announcer.announce("hello").await;
        assert!(!delivery.is_delivered());
        assert_eq!(delivery, Delivery::Dropped("channel not found".into()));
    }

    struct StuckNotifier;

    #[async_trait]
    impl Notifier for StuckNotifier {
        async fn wait_ready(&self) -> Result<()> {
            Ok(())
        }

        async fn send(&self, _text: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_is_time_bounded() {
        let announcer = Announcer::new(Box::new(StuckNotifier), Duration::from_secs(5));
        let delivery = announcer.announce("hello").await;
        match delivery {
            Delivery::Dropped(reason) => assert!(reason.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_log_notifier() {
        let announcer = Announcer::new(Box::new(LogNotifier), Duration::from_secs(1));
        tokio_test::assert_ok!(announcer.wait_ready().await);
        assert!(announcer.announce("swept").await.is_delivered());
    }
}
