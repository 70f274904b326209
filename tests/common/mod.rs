//! In-memory ledger and notifier for integration testing.
//!
//! `FakeLedger` holds a set of coin objects for one account and applies
//! transfers to them; `RecordingNotifier` keeps every message it is sent.
//! Both are cheap clones over shared state so the test keeps a handle
//! after handing one to the loop.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sweeper::engine::executor::TransferExecutor;
use sweeper::engine::policy::{PolicyConfig, SweepMode, SweepPolicy};
use sweeper::engine::reader::BalanceReader;
use sweeper::engine::sweeper::{LoopConfig, SweepLoop};
use sweeper::ledger::{FundUnitPage, LedgerClient};
use sweeper::notify::{Announcer, Notifier};
use sweeper::types::{FundUnit, Mist, TransferRequest};

pub const ACCOUNT: &str = "0xacc0acc0acc0acc0acc0acc0acc0acc0acc0acc0acc0acc0acc0acc0acc0acc0";
pub const TARGET: &str = "0xd35d35d35d35d35d35d35d35d35d35d35d35d35d35d35d35d35d35d35d35d35d";
pub const COIN_TYPE: &str = "0x2::sui::SUI";
pub const THRESHOLD: Mist = 10_000_000;
pub const FEE: Mist = 1_000_000;
/// Gas actually charged by the fake per transfer.
pub const GAS_USED: Mist = 750_000;

// ---------------------------------------------------------------------------
// Fake ledger
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerState {
    units: Vec<FundUnit>,
    transfers: Vec<TransferRequest>,
    next_object: u64,
    read_error: Option<String>,
    transfer_error: Option<String>,
    /// When false, transfers are accepted but balances never move.
    settle: bool,
}

#[derive(Clone)]
pub struct FakeLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl FakeLedger {
    /// An account holding coins of the given values.
    pub fn with_units(values: &[Mist]) -> Self {
        let units = values
            .iter()
            .enumerate()
            .map(|(i, v)| FundUnit::new(format!("0xc0{i:02}"), *v))
            .collect();
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                units,
                next_object: values.len() as u64,
                settle: true,
                ..LedgerState::default()
            })),
        }
    }

    pub fn balance(&self) -> Mist {
        self.state.lock().unwrap().units.iter().map(|u| u.value).sum()
    }

    /// Simulate an incoming deposit as a new coin object.
    pub fn deposit(&self, value: Mist) {
        let mut s = self.state.lock().unwrap();
        let id = format!("0xc0{:02}", s.next_object);
        s.next_object += 1;
        s.units.push(FundUnit::new(id, value));
    }

    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn set_read_error(&self, msg: Option<&str>) {
        self.state.lock().unwrap().read_error = msg.map(str::to_string);
    }

    pub fn set_transfer_error(&self, msg: Option<&str>) {
        self.state.lock().unwrap().transfer_error = msg.map(str::to_string);
    }

    pub fn set_settle(&self, settle: bool) {
        self.state.lock().unwrap().settle = settle;
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn get_balance(&self, _owner: &str, _coin_type: &str) -> Result<Mist> {
        let s = self.state.lock().unwrap();
        if let Some(e) = &s.read_error {
            return Err(anyhow!("{e}"));
        }
        Ok(s.units.iter().map(|u| u.value).sum())
    }

    async fn get_fund_units(
        &self,
        _owner: &str,
        _coin_type: &str,
        _cursor: Option<String>,
        limit: u32,
    ) -> Result<FundUnitPage> {
        let s = self.state.lock().unwrap();
        if let Some(e) = &s.read_error {
            return Err(anyhow!("{e}"));
        }
        let limit = limit as usize;
        Ok(FundUnitPage {
            units: s.units.iter().take(limit).cloned().collect(),
            next_cursor: None,
            has_next_page: s.units.len() > limit,
        })
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<String> {
        let mut s = self.state.lock().unwrap();
        if let Some(e) = &s.transfer_error {
            return Err(anyhow!("{e}"));
        }

        let ids = request.source_ids();
        let available: Mist = s
            .units
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| u.value)
            .sum();
        if available < request.amount {
            return Err(anyhow!(
                "InsufficientCoinBalance: {available} < {}",
                request.amount
            ));
        }

        s.transfers.push(request.clone());
        let digest = format!("FAKE{}", s.transfers.len());

        if s.settle {
            s.units.retain(|u| !ids.contains(&u.id));
            let change = available - request.amount;
            let change = change.saturating_sub(GAS_USED);
            if change > 0 {
                let id = format!("0xc0{:02}", s.next_object);
                s.next_object += 1;
                s.units.push(FundUnit::new(id, change));
            }
        }

        Ok(digest)
    }
}

// ---------------------------------------------------------------------------
// Recording notifier
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Make every subsequent send fail.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn wait_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(anyhow!("Missing Access"));
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loop assembly
// ---------------------------------------------------------------------------

pub fn build_loop(
    ledger: &FakeLedger,
    notifier: &RecordingNotifier,
    mode: SweepMode,
    dry_run: bool,
) -> SweepLoop {
    let client: Arc<dyn LedgerClient> = Arc::new(ledger.clone());
    SweepLoop::new(
        ACCOUNT,
        BalanceReader::new(client.clone(), COIN_TYPE, 100),
        SweepPolicy::new(PolicyConfig {
            threshold: THRESHOLD,
            reserved_fee: FEE,
            mode,
            destination: TARGET.to_string(),
        }),
        TransferExecutor::new(client, dry_run),
        Announcer::new(Box::new(notifier.clone()), Duration::from_secs(5)),
        LoopConfig::default(),
    )
}
