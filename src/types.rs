//! Shared types for the SWEEPER agent.
//!
//! These types form the data model used across the ledger, engine and
//! notifier modules. Amounts are always carried in MIST (the ledger's
//! smallest denomination) as `u64`; `Decimal` is only used at the edges
//! for human-readable SUI values.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Denomination
// ---------------------------------------------------------------------------

/// Amount in MIST (1 SUI = 1_000_000_000 MIST).
pub type Mist = u64;

/// MIST per whole SUI.
pub const MIST_PER_SUI: u64 = 1_000_000_000;

/// Convert MIST to a human-readable SUI amount.
pub fn mist_to_sui(mist: Mist) -> Decimal {
    Decimal::from(mist) / Decimal::from(MIST_PER_SUI)
}

/// Convert a SUI amount to MIST, rounding to the nearest MIST.
///
/// Returns `None` for negative values or amounts that overflow `u64`.
pub fn sui_to_mist(sui: Decimal) -> Option<Mist> {
    if sui.is_sign_negative() && !sui.is_zero() {
        return None;
    }
    sui.checked_mul(Decimal::from(MIST_PER_SUI))?.round().to_u64()
}

/// Format a MIST amount as SUI with nine decimal places trimmed.
pub fn format_sui(mist: Mist) -> String {
    format!("{} SUI", mist_to_sui(mist).normalize())
}

/// Shorten an address or object id for display: `0x1234ab...cdef`.
pub fn short_id(id: &str) -> String {
    if id.len() <= 14 || !id.is_ascii() {
        return id.to_string();
    }
    format!("{}...{}", &id[..8], &id[id.len() - 4..])
}

/// Check that a string looks like a Sui address: `0x` followed by 1–64 hex digits.
pub fn is_valid_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex) => !hex.is_empty() && hex.len() <= 64 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Fund units and snapshots
// ---------------------------------------------------------------------------

/// A discrete spendable unit on the ledger (a `Coin<SUI>` object).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundUnit {
    /// Coin object id.
    pub id: String,
    /// Value in MIST.
    pub value: Mist,
}

impl FundUnit {
    pub fn new(id: impl Into<String>, value: Mist) -> Self {
        Self { id: id.into(), value }
    }
}

impl fmt::Display for FundUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", short_id(&self.id), format_sui(self.value))
    }
}

/// Point-in-time view of the account's spendable value.
///
/// Built fresh every poll cycle and dropped once the cycle's decision has
/// been made.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BalanceSnapshot {
    /// Total spendable value reported by the ledger.
    pub total: Mist,
    /// Units observed (first page only).
    pub units: Vec<FundUnit>,
    /// The ledger reported more unit pages than were read.
    pub truncated: bool,
    /// Zero value produced because the read failed.
    pub read_fault: bool,
}

impl BalanceSnapshot {
    pub fn new(total: Mist, units: Vec<FundUnit>) -> Self {
        Self {
            total,
            units,
            truncated: false,
            read_fault: false,
        }
    }

    /// The zero snapshot substituted for a failed read.
    pub fn fault() -> Self {
        Self {
            read_fault: true,
            ..Self::default()
        }
    }

    /// Sum of the observed units' values.
    pub fn units_value(&self) -> Mist {
        self.units.iter().fold(0u64, |acc, u| acc.saturating_add(u.value))
    }
}

// ---------------------------------------------------------------------------
// Sweep state
// ---------------------------------------------------------------------------

/// Where the loop stands relative to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepPhase {
    /// Balance at or below the threshold.
    Idle,
    /// Balance above the threshold, no sweep attempted yet.
    AboveThresholdNotSwept,
    /// A sweep went out for the current above-threshold period.
    Swept,
}

impl fmt::Display for SweepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepPhase::Idle => write!(f, "idle"),
            SweepPhase::AboveThresholdNotSwept => write!(f, "above-threshold"),
            SweepPhase::Swept => write!(f, "swept"),
        }
    }
}

/// Idempotency flag held by the loop for the lifetime of the process.
///
/// `already_swept` is set once a sweep has gone out while the balance is above
/// the threshold, and cleared the moment the balance is observed at or below
/// it again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepState {
    pub already_swept: bool,
}

impl SweepState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the loop phase from the flag and the latest observed total.
    pub fn phase(&self, total: Mist, threshold: Mist) -> SweepPhase {
        if total <= threshold {
            SweepPhase::Idle
        } else if self.already_swept {
            SweepPhase::Swept
        } else {
            SweepPhase::AboveThresholdNotSwept
        }
    }
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

/// One transfer instruction.
///
/// The first source unit pays gas. `amount` is strictly positive and never
/// exceeds the sources' value minus `gas_budget`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub sources: Vec<FundUnit>,
    pub destination: String,
    pub amount: Mist,
    pub gas_budget: Mist,
}

impl TransferRequest {
    /// The unit paying for gas.
    pub fn gas_payer(&self) -> Option<&FundUnit> {
        self.sources.first()
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources.iter().map(|u| u.id.clone()).collect()
    }
}

/// What the ledger said about a submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Success { digest: String },
    Failure { cause: String },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success { .. })
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SWEEPER.
#[derive(Debug, thiserror::Error)]
pub enum SweeperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("RPC error ({method}) {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Notifier error ({channel}): {message}")]
    Notify { channel: String, message: String },
}

/// Default reserved fee: 0.001 SUI.
pub const DEFAULT_RESERVED_FEE_SUI: Decimal = dec!(0.001);

/// Default sweep threshold: 0.01 SUI.
pub const DEFAULT_THRESHOLD_SUI: Decimal = dec!(0.01);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
