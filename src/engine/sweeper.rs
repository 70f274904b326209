//! Sweep loop — the observe → decide → execute → announce cycle.
//!
//! One cycle at a time, never overlapping. Shutdown is only honoured
//! between cycles: a transfer that has been submitted is never abandoned.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::executor::TransferExecutor;
use crate::engine::messages;
use crate::engine::policy::{SweepDecision, SweepPolicy};
use crate::engine::reader::BalanceReader;
use crate::engine::report::CycleReport;
use crate::notify::{Announcer, Delivery};
use crate::types::{format_sui, BalanceSnapshot, Mist, SweepState, TransferOutcome};

/// Timing and announcement knobs for the loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub poll_interval: Duration,
    /// Extra wait after a cycle in which a transfer succeeded.
    pub settle_delay: Duration,
    /// Cap for the backoff after failed sweeps. Zero disables backoff.
    pub max_backoff: Duration,
    pub announce_balance_changes: bool,
    /// Explorer link template containing `{digest}`.
    pub explorer_tx_url: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_secs(5),
            max_backoff: Duration::ZERO,
            announce_balance_changes: true,
            explorer_tx_url: "https://suiscan.xyz/mainnet/tx/{digest}".to_string(),
        }
    }
}

pub struct SweepLoop {
    address: String,
    reader: BalanceReader,
    policy: SweepPolicy,
    executor: TransferExecutor,
    announcer: Announcer,
    config: LoopConfig,
    state: SweepState,
    cycle_count: u64,
    /// Last total that was successfully observed.
    last_total: Mist,
    /// Consecutive cycles whose sweep went out with no success.
    failed_sweeps: u32,
}

impl SweepLoop {
    pub fn new(
        address: impl Into<String>,
        reader: BalanceReader,
        policy: SweepPolicy,
        executor: TransferExecutor,
        announcer: Announcer,
        config: LoopConfig,
    ) -> Self {
        Self {
            address: address.into(),
            reader,
            policy,
            executor,
            announcer,
            config,
            state: SweepState::new(),
            cycle_count: 0,
            last_total: 0,
            failed_sweeps: 0,
        }
    }

    pub fn state(&self) -> &SweepState {
        &self.state
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Run one complete cycle. Never fails: every fault ends up in the report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle_count += 1;
        let mut report = CycleReport::new(self.cycle_count);

        // 1. Observe
        let snapshot = self.reader.observe(&self.address).await;
        report.balance = snapshot.total;
        report.units_observed = snapshot.units.len();
        report.read_fault = snapshot.read_fault;

        if self.config.announce_balance_changes {
            self.announce_balance_change(&snapshot, &mut report).await;
        }

        // 2. Decide
        let decision = self.policy.decide(&snapshot, &mut self.state);

        // 3. Execute, one request at a time, in order
        match decision {
            SweepDecision::NoAction(reason) => {
                debug!(reason = %reason, "No sweep this cycle");
                report.no_action = Some(reason);
            }
            SweepDecision::Sweep(requests) => {
                info!(
                    balance = %format_sui(snapshot.total),
                    transfers = requests.len(),
                    "Balance above threshold, sweeping"
                );

                for request in &requests {
                    report.transfers_attempted += 1;
                    let message = match self.executor.execute(request).await {
                        TransferOutcome::Success { digest } => {
                            report.transfers_succeeded += 1;
                            report.amount_swept += request.amount;
                            messages::sweep_succeeded(
                                &self.address,
                                request,
                                &digest,
                                &self.config.explorer_tx_url,
                            )
                        }
                        TransferOutcome::Failure { cause } => {
                            report.transfers_failed += 1;
                            messages::sweep_failed(request, &cause)
                        }
                    };
                    self.announce(&message, &mut report).await;
                }

                // Swept only once something actually left the account.
                if report.transfers_succeeded > 0 {
                    self.state.already_swept = true;
                }
            }
        }

        if report.sweep_failed() {
            self.failed_sweeps = self.failed_sweeps.saturating_add(1);
            warn!(
                consecutive = self.failed_sweeps,
                "Sweep failed, will retry next cycle"
            );
        } else if report.transfers_succeeded > 0 || report.no_action.is_some() {
            self.failed_sweeps = 0;
        }

        report.phase = self
            .state
            .phase(snapshot.total, self.policy.config().threshold);
        report
    }

    /// Delay before the next cycle, given the one just finished.
    pub fn next_delay(&self, report: &CycleReport) -> Duration {
        if report.transfers_succeeded > 0 {
            return self.config.poll_interval + self.config.settle_delay;
        }
        if self.failed_sweeps > 0 && !self.config.max_backoff.is_zero() {
            let factor = 1u32 << self.failed_sweeps.min(16);
            let backoff = self.config.poll_interval.saturating_mul(factor);
            return backoff.min(self.config.max_backoff).max(self.config.poll_interval);
        }
        self.config.poll_interval
    }

    /// Announce startup on the configured channel.
    pub async fn announce_start(&self) -> Delivery {
        let policy = self.policy.config();
        let message = messages::started(
            &self.address,
            &policy.destination,
            policy.threshold,
            self.executor.is_dry_run(),
        );
        self.announcer.announce(&message).await
    }

    /// Cycle until `shutdown` resolves. The signal is only observed while
    /// sleeping between cycles.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            address = %self.address,
            poll_interval = ?self.config.poll_interval,
            mode = %self.policy.config().mode,
            "Entering sweep loop"
        );

        loop {
            let report = self.run_cycle().await;
            report.log();

            let delay = self.next_delay(&report);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received.");
                    break;
                }
            }
        }

        info!(
            cycles = self.cycle_count,
            swept = self.state.already_swept,
            "Sweep loop stopped"
        );
    }

    async fn announce_balance_change(&mut self, snapshot: &BalanceSnapshot, report: &mut CycleReport) {
        // A failed read says nothing about the real balance.
        if snapshot.read_fault || snapshot.total == self.last_total {
            return;
        }
        debug!(
            previous = %format_sui(self.last_total),
            current = %format_sui(snapshot.total),
            "Balance changed"
        );
        self.last_total = snapshot.total;
        let message = messages::balance_changed(&self.address, snapshot.total);
        self.announce(&message, report).await;
    }

    async fn announce(&self, message: &str, report: &mut CycleReport) {
        if let Delivery::Dropped(_) = self.announcer.announce(message).await {
            report.notifications_dropped += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::policy::{NoActionReason, PolicyConfig, SweepMode};
    use crate::ledger::{FundUnitPage, MockLedgerClient};
    use crate::notify::MockNotifier;
    use crate::types::{FundUnit, SweepPhase};
    use std::sync::Arc;

    const ADDR: &str = "0xacc0acc0acc0acc0acc0acc0acc0acc0";
    const DEST: &str = "0xd35d35d35d35d35d35d35d35d35d3500";
    const THRESHOLD: Mist = 10_000_000;
    const FEE: Mist = 1_000_000;

    fn page(units: Vec<FundUnit>) -> FundUnitPage {
        FundUnitPage {
            units,
            next_cursor: None,
            has_next_page: false,
        }
    }

    fn quiet_notifier() -> MockNotifier {
        let mut n = MockNotifier::new();
        n.expect_send().returning(|_| Ok(()));
        n
    }

    fn sweep_loop(ledger: MockLedgerClient, notifier: MockNotifier, config: LoopConfig) -> SweepLoop {
        let ledger: Arc<dyn crate::ledger::LedgerClient> = Arc::new(ledger);
        SweepLoop::new(
            ADDR,
            BalanceReader::new(ledger.clone(), "0x2::sui::SUI", 100),
            SweepPolicy::new(PolicyConfig {
                threshold: THRESHOLD,
                reserved_fee: FEE,
                mode: SweepMode::WholeBalance,
                destination: DEST.to_string(),
            }),
            TransferExecutor::new(ledger, false),
            Announcer::new(Box::new(notifier), Duration::from_secs(1)),
            config,
        )
    }

    /// Ledger that always reports one coin holding `value`.
    fn holding(value: Mist) -> MockLedgerClient {
        let mut ledger = MockLedgerClient::new();
        ledger.expect_get_balance().returning(move |_, _| Ok(value));
        ledger
            .expect_get_fund_units()
            .returning(move |_, _, _, _| Ok(page(vec![FundUnit::new("0xc01", value)])));
        ledger
    }

    #[tokio::test]
    async fn test_below_threshold_is_idle() {
        let mut ledger = holding(4_000_000);
        ledger.expect_transfer().times(0);

        let mut sweeper = sweep_loop(ledger, quiet_notifier(), LoopConfig::default());
        let report = sweeper.run_cycle().await;

        assert_eq!(report.no_action, Some(NoActionReason::BelowThreshold));
        assert_eq!(report.transfers_attempted, 0);
        assert_eq!(report.phase, SweepPhase::Idle);
        assert!(!sweeper.state().already_swept);
    }

    #[tokio::test]
    async fn test_sweeps_once_then_holds() {
        let mut ledger = holding(20_000_000);
        ledger
            .expect_transfer()
            .times(1)
            .withf(|req| req.amount == 19_000_000 && req.destination == DEST)
            .returning(|_| Ok("DiGeSt1".to_string()));

        let mut notifier = MockNotifier::new();
        // Balance change on the first cycle, then the success message.
        notifier.expect_send().times(2).returning(|_| Ok(()));

        let mut sweeper = sweep_loop(ledger, notifier, LoopConfig::default());

        let first = sweeper.run_cycle().await;
        assert_eq!(first.transfers_succeeded, 1);
        assert_eq!(first.amount_swept, 19_000_000);
        assert_eq!(first.phase, SweepPhase::Swept);

        let second = sweeper.run_cycle().await;
        assert_eq!(second.no_action, Some(NoActionReason::AlreadySwept));
        assert_eq!(second.transfers_attempted, 0);
        assert_eq!(sweeper.cycle_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_transfer_retries_next_cycle() {
        let mut ledger = holding(20_000_000);
        let mut calls = 0;
        ledger.expect_transfer().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(anyhow::anyhow!("InsufficientGas"))
            } else {
                Ok("DiGeSt2".to_string())
            }
        });

        let mut sweeper = sweep_loop(ledger, quiet_notifier(), LoopConfig::default());

        let first = sweeper.run_cycle().await;
        assert!(first.sweep_failed());
        assert!(!sweeper.state().already_swept);
        assert_eq!(first.phase, SweepPhase::AboveThresholdNotSwept);

        let second = sweeper.run_cycle().await;
        assert_eq!(second.transfers_succeeded, 1);
        assert!(sweeper.state().already_swept);
    }

    #[tokio::test]
    async fn test_read_fault_resets_without_announcing() {
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_balance()
            .returning(|_, _| Err(anyhow::anyhow!("connection refused")));
        ledger.expect_transfer().times(0);

        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(0);

        let mut sweeper = sweep_loop(ledger, notifier, LoopConfig::default());
        sweeper.state.already_swept = true;

        let report = sweeper.run_cycle().await;
        assert!(report.read_fault);
        assert_eq!(report.no_action, Some(NoActionReason::BelowThreshold));
        assert!(!sweeper.state().already_swept);
    }

    #[tokio::test]
    async fn test_dropped_announcement_does_not_stop_the_cycle() {
        let mut ledger = holding(20_000_000);
        ledger
            .expect_transfer()
            .times(1)
            .returning(|_| Ok("DiGeSt3".to_string()));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .returning(|_| Err(anyhow::anyhow!("Missing Access")));

        let mut sweeper = sweep_loop(ledger, notifier, LoopConfig::default());
        let report = sweeper.run_cycle().await;

        assert_eq!(report.transfers_succeeded, 1);
        assert_eq!(report.notifications_dropped, 2);
        assert!(sweeper.state().already_swept);
    }

    #[tokio::test]
    async fn test_balance_changes_announced_only_on_change() {
        let mut ledger = holding(4_000_000);
        ledger.expect_transfer().times(0);

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .times(1)
            .withf(|text| text.to_string().contains("0.004 SUI"))
            .returning(|_| Ok(()));

        let mut sweeper = sweep_loop(ledger, notifier, LoopConfig::default());
        sweeper.run_cycle().await;
        sweeper.run_cycle().await;
        sweeper.run_cycle().await;
    }

    #[tokio::test]
    async fn test_balance_announcements_can_be_disabled() {
        let mut ledger = holding(4_000_000);
        ledger.expect_transfer().times(0);

        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(0);

        let config = LoopConfig {
            announce_balance_changes: false,
            ..LoopConfig::default()
        };
        let mut sweeper = sweep_loop(ledger, notifier, config);
        sweeper.run_cycle().await;
    }

    #[tokio::test]
    async fn test_next_delay_settles_after_success() {
        let mut ledger = holding(20_000_000);
        ledger
            .expect_transfer()
            .returning(|_| Ok("DiGeSt4".to_string()));

        let mut sweeper = sweep_loop(ledger, quiet_notifier(), LoopConfig::default());
        let first = sweeper.run_cycle().await;
        assert_eq!(sweeper.next_delay(&first), Duration::from_secs(6));

        let second = sweeper.run_cycle().await;
        assert_eq!(sweeper.next_delay(&second), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_backoff_after_failed_sweeps() {
        let mut ledger = holding(20_000_000);
        ledger
            .expect_transfer()
            .returning(|_| Err(anyhow::anyhow!("rpc down")));

        let config = LoopConfig {
            max_backoff: Duration::from_secs(5),
            ..LoopConfig::default()
        };
        let mut sweeper = sweep_loop(ledger, quiet_notifier(), config);

        let r1 = sweeper.run_cycle().await;
        assert_eq!(sweeper.next_delay(&r1), Duration::from_secs(2));
        let r2 = sweeper.run_cycle().await;
        assert_eq!(sweeper.next_delay(&r2), Duration::from_secs(4));
        let r3 = sweeper.run_cycle().await;
        assert_eq!(sweeper.next_delay(&r3), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_no_backoff_by_default() {
        let mut ledger = holding(20_000_000);
        ledger
            .expect_transfer()
            .returning(|_| Err(anyhow::anyhow!("rpc down")));

        let mut sweeper = sweep_loop(ledger, quiet_notifier(), LoopConfig::default());
        let r1 = sweeper.run_cycle().await;
        let r2 = sweeper.run_cycle().await;
        assert_eq!(sweeper.next_delay(&r1), Duration::from_secs(1));
        assert_eq!(sweeper.next_delay(&r2), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_announce_start() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .times(1)
            .withf(|text| text.to_string().contains("Sweeper online"))
            .returning(|_| Ok(()));

        let sweeper = sweep_loop(MockLedgerClient::new(), notifier, LoopConfig::default());
        assert!(sweeper.announce_start().await.is_delivered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let ledger = holding(4_000_000);
        let sweeper = sweep_loop(ledger, quiet_notifier(), LoopConfig::default());

        let shutdown = tokio::time::sleep(Duration::from_millis(2500));
        tokio::time::timeout(Duration::from_secs(60), sweeper.run(shutdown))
            .await
            .expect("loop should stop on shutdown");
    }
}
