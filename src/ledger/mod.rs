//! Ledger integration.
//!
//! Defines the `LedgerClient` trait consumed by the sweep engine and the
//! Sui JSON-RPC implementation behind it:
//! - `sui` — fullnode JSON-RPC client (balance, coins, pay + execute)
//! - `keys` — Ed25519 key parsing, address derivation, transaction signing

pub mod keys;
pub mod sui;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{FundUnit, Mist, TransferRequest};

/// One page of fund units as returned by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FundUnitPage {
    pub units: Vec<FundUnit>,
    pub next_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Abstraction over the ledger's query and transfer interfaces.
///
/// Queries are read-only and idempotent. `transfer` submits at most once per
/// call and never retries internally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Total spendable value of `coin_type` held by `owner`.
    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<Mist>;

    /// Enumerate the coin objects backing the balance, one page at a time.
    async fn get_fund_units(
        &self,
        owner: &str,
        coin_type: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<FundUnitPage>;

    /// Submit a transfer and return the transaction digest.
    async fn transfer(&self, request: &TransferRequest) -> Result<String>;
}
