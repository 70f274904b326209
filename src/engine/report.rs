//! Cycle report — what one observe → decide → execute pass did.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info};

use crate::engine::policy::NoActionReason;
use crate::types::{format_sui, Mist, SweepPhase};

/// Summary of a complete sweep cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub timestamp: DateTime<Utc>,
    /// Observed total (0 on a read fault).
    pub balance: Mist,
    pub units_observed: usize,
    pub read_fault: bool,
    /// Set when the policy declined to sweep.
    pub no_action: Option<NoActionReason>,
    pub transfers_attempted: usize,
    pub transfers_succeeded: usize,
    pub transfers_failed: usize,
    /// Sum of the amounts of successful transfers.
    pub amount_swept: Mist,
    pub notifications_dropped: usize,
    /// Phase after the cycle.
    pub phase: SweepPhase,
}

impl CycleReport {
    pub fn new(cycle_number: u64) -> Self {
        Self {
            cycle_number,
            timestamp: Utc::now(),
            balance: 0,
            units_observed: 0,
            read_fault: false,
            no_action: None,
            transfers_attempted: 0,
            transfers_succeeded: 0,
            transfers_failed: 0,
            amount_swept: 0,
            notifications_dropped: 0,
            phase: SweepPhase::Idle,
        }
    }

    /// A sweep was attempted and nothing went out.
    pub fn sweep_failed(&self) -> bool {
        self.transfers_attempted > 0 && self.transfers_succeeded == 0
    }

    /// Emit the report: info when transfers happened, debug otherwise.
    pub fn log(&self) {
        if self.transfers_attempted > 0 {
            info!(
                cycle = self.cycle_number,
                balance = %format_sui(self.balance),
                attempted = self.transfers_attempted,
                succeeded = self.transfers_succeeded,
                failed = self.transfers_failed,
                swept = %format_sui(self.amount_swept),
                phase = %self.phase,
                "Sweep cycle complete"
            );
        } else {
            debug!(
                cycle = self.cycle_number,
                balance = %format_sui(self.balance),
                units = self.units_observed,
                read_fault = self.read_fault,
                reason = ?self.no_action,
                phase = %self.phase,
                "Cycle complete"
            );
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle #{}: balance={} units={} transfers={}/{} swept={} phase={}",
            self.cycle_number,
            format_sui(self.balance),
            self.units_observed,
            self.transfers_succeeded,
            self.transfers_attempted,
            format_sui(self.amount_swept),
            self.phase,
        )
    }
}
