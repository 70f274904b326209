//! Sweep policy — threshold, idempotency and fee accounting.
//!
//! Pure decision logic: no I/O. Given a balance snapshot and the loop's
//! sweep state, decides whether to sweep and builds the exact transfer
//! requests. The reserved fee is withheld exactly once per sweep cycle.

use serde::Deserialize;
use std::fmt;
use tracing::debug;

use crate::types::{BalanceSnapshot, Mist, SweepState, TransferRequest};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How funds are split into transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// One transfer of `total - fee`; the first unit pays gas and every
    /// observed unit is merged in as a source.
    WholeBalance,
    /// One transfer per unit; only the first unit withholds the fee.
    PerUnit,
}

impl fmt::Display for SweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepMode::WholeBalance => write!(f, "whole-balance"),
            SweepMode::PerUnit => write!(f, "per-unit"),
        }
    }
}

/// Policy parameters, all amounts in MIST.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub threshold: Mist,
    pub reserved_fee: Mist,
    pub mode: SweepMode,
    pub destination: String,
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Why a cycle did not sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoActionReason {
    /// Balance at or below the threshold; state was reset.
    BelowThreshold,
    /// A sweep already went out for this above-threshold period.
    AlreadySwept,
    /// Above threshold but no units were enumerated.
    NoFundUnits,
    /// Nothing positive left once the fee is withheld.
    InsufficientAfterFee,
}

impl fmt::Display for NoActionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoActionReason::BelowThreshold => write!(f, "below threshold"),
            NoActionReason::AlreadySwept => write!(f, "already swept"),
            NoActionReason::NoFundUnits => write!(f, "no fund units"),
            NoActionReason::InsufficientAfterFee => write!(f, "insufficient after fee"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepDecision {
    NoAction(NoActionReason),
    Sweep(Vec<TransferRequest>),
}

impl SweepDecision {
    pub fn is_sweep(&self) -> bool {
        matches!(self, SweepDecision::Sweep(_))
    }

    /// Sum of all requested amounts (0 for `NoAction`).
    pub fn total_amount(&self) -> Mist {
        match self {
            SweepDecision::NoAction(_) => 0,
            SweepDecision::Sweep(requests) => requests.iter().map(|r| r.amount).sum(),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

pub struct SweepPolicy {
    config: PolicyConfig,
}

impl SweepPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Decide what this cycle does.
    ///
    /// Resets `state.already_swept` when the balance is at or below the
    /// threshold. Never sets it: the loop does that once a transfer has
    /// actually gone out.
    pub fn decide(&self, snapshot: &BalanceSnapshot, state: &mut SweepState) -> SweepDecision {
        if snapshot.total <= self.config.threshold {
            if state.already_swept {
                debug!(total = snapshot.total, "Balance back at or below threshold, re-arming");
            }
            state.already_swept = false;
            return SweepDecision::NoAction(NoActionReason::BelowThreshold);
        }

        if state.already_swept {
            return SweepDecision::NoAction(NoActionReason::AlreadySwept);
        }

        if snapshot.units.is_empty() {
            return SweepDecision::NoAction(NoActionReason::NoFundUnits);
        }

        let requests = match self.config.mode {
            SweepMode::WholeBalance => self.whole_balance(snapshot),
            SweepMode::PerUnit => self.per_unit(snapshot),
        };

        if requests.is_empty() {
            SweepDecision::NoAction(NoActionReason::InsufficientAfterFee)
        } else {
            SweepDecision::Sweep(requests)
        }
    }

    /// Single transfer of everything the observed units can cover, less fee.
    fn whole_balance(&self, snapshot: &BalanceSnapshot) -> Vec<TransferRequest> {
        // Never ask for more than the referenced units hold.
        let available = snapshot.total.min(snapshot.units_value());
        let amount = available.saturating_sub(self.config.reserved_fee);
        if amount == 0 {
            return Vec::new();
        }

        vec![TransferRequest {
            sources: snapshot.units.clone(),
            destination: self.config.destination.clone(),
            amount,
            gas_budget: self.config.reserved_fee,
        }]
    }

    /// One transfer per unit; the first unit alone withholds the fee.
    fn per_unit(&self, snapshot: &BalanceSnapshot) -> Vec<TransferRequest> {
        snapshot
            .units
            .iter()
            .enumerate()
            .filter_map(|(i, unit)| {
                let send_value = if i == 0 {
                    unit.value.saturating_sub(self.config.reserved_fee)
                } else {
                    unit.value
                };
                if send_value == 0 {
                    debug!(unit = %unit, "Skipping unit with nothing to send");
                    return None;
                }
                Some(TransferRequest {
                    sources: vec![unit.clone()],
                    destination: self.config.destination.clone(),
                    amount: send_value,
                    gas_budget: self.config.reserved_fee,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
