//! Balance reader.
//!
//! Observes the account's total spendable value and the coin objects
//! backing it. A failed read never propagates: it yields the zero snapshot
//! so the loop carries on.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ledger::LedgerClient;
use crate::types::{format_sui, BalanceSnapshot};

pub struct BalanceReader {
    ledger: Arc<dyn LedgerClient>,
    coin_type: String,
    page_size: u32,
}

impl BalanceReader {
    pub fn new(ledger: Arc<dyn LedgerClient>, coin_type: impl Into<String>, page_size: u32) -> Self {
        Self {
            ledger,
            coin_type: coin_type.into(),
            page_size,
        }
    }

    /// Observe `address`. Any failure becomes the zero snapshot.
    pub async fn observe(&self, address: &str) -> BalanceSnapshot {
        match self.try_observe(address).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Balance read failed, treating as zero");
                BalanceSnapshot::fault()
            }
        }
    }

    async fn try_observe(&self, address: &str) -> Result<BalanceSnapshot> {
        let total = self.ledger.get_balance(address, &self.coin_type).await?;

        // Only the first page is read.
        let page = self
            .ledger
            .get_fund_units(address, &self.coin_type, None, self.page_size)
            .await?;

        if page.has_next_page {
            warn!(
                read = page.units.len(),
                page_size = self.page_size,
                "More coin objects than one page; sweeping the first page only"
            );
        }

        debug!(
            total = %format_sui(total),
            units = page.units.len(),
            "Balance observed"
        );
        for (idx, unit) in page.units.iter().enumerate() {
            debug!(idx = idx + 1, id = %unit.id, value = %format_sui(unit.value), "Coin object");
        }

        Ok(BalanceSnapshot {
            total,
            units: page.units,
            truncated: page.has_next_page,
            read_fault: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
