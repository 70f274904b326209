//! Transfer executor.
//!
//! Submits sweep transfers to the ledger, one call per request, and turns
//! whatever comes back into a [`TransferOutcome`]. No retries here: a failed
//! transfer is retried by the loop on its next cycle.

use std::sync::Arc;
use tracing::{info, warn};

use crate::ledger::LedgerClient;
use crate::types::{format_sui, short_id, TransferOutcome, TransferRequest};

pub struct TransferExecutor {
    ledger: Arc<dyn LedgerClient>,
    dry_run: bool,
}

impl TransferExecutor {
    pub fn new(ledger: Arc<dyn LedgerClient>, dry_run: bool) -> Self {
        Self { ledger, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute one transfer.
    ///
    /// In dry-run mode, logs but doesn't submit anything.
    pub async fn execute(&self, request: &TransferRequest) -> TransferOutcome {
        let gas_payer = request.gas_payer().map(|u| short_id(&u.id)).unwrap_or_default();

        if self.dry_run {
            info!(
                amount = %format_sui(request.amount),
                gas_payer = %gas_payer,
                sources = request.sources.len(),
                destination = %short_id(&request.destination),
                "[DRY RUN] Would transfer"
            );
            return TransferOutcome::Success {
                digest: dry_run_digest(),
            };
        }

        match self.ledger.transfer(request).await {
            Ok(digest) => {
                info!(
                    digest = %digest,
                    amount = %format_sui(request.amount),
                    gas_payer = %gas_payer,
                    "Transfer submitted"
                );
                TransferOutcome::Success { digest }
            }
            Err(e) => {
                let cause = format!("{e:#}");
                warn!(
                    amount = %format_sui(request.amount),
                    gas_payer = %gas_payer,
                    error = %cause,
                    "Transfer failed"
                );
                TransferOutcome::Failure { cause }
            }
        }
    }
}

/// Synthetic digest for transfers that were only logged.
pub fn dry_run_digest() -> String {
    format!("dry-run-{}", uuid::Uuid::new_v4())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
