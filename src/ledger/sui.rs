//! Sui fullnode JSON-RPC integration.
//!
//! Reads the account's balance and coin objects, and sweeps funds with
//! `unsafe_paySui` (the node builds the transaction bytes) followed by a
//! locally signed `sui_executeTransactionBlock`.
//!
//! API docs: https://docs.sui.io/sui-api-ref
//! Mainnet fullnode: https://fullnode.mainnet.sui.io:443
//! Auth: none; transactions are authorised by the signature alone.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::keys::SuiKeypair;
use super::{FundUnitPage, LedgerClient};
use crate::types::{FundUnit, Mist, SweeperError, TransferRequest};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default mainnet fullnode.
pub const MAINNET_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";

/// Native SUI coin type.
pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";

/// Largest page `suix_getCoins` will return.
pub const MAX_PAGE_SIZE: u32 = 100;

// ---------------------------------------------------------------------------
// JSON-RPC envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

// ---------------------------------------------------------------------------
// API response types (Sui JSON → Rust)
// ---------------------------------------------------------------------------

/// `suix_getBalance` result. Amounts are u128 rendered as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    total_balance: String,
}

/// `suix_getCoins` result page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPage {
    data: Vec<CoinObject>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinObject {
    coin_object_id: String,
    balance: String,
}

/// `unsafe_paySui` result: unsigned BCS transaction bytes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBytes {
    tx_bytes: String,
}

/// `sui_executeTransactionBlock` result; only the fields we need.
#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    effects: Option<Effects>,
}

#[derive(Debug, Deserialize)]
struct Effects {
    status: ExecutionStatus,
}

#[derive(Debug, Deserialize)]
struct ExecutionStatus {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

fn parse_mist(field: &str, raw: &str) -> Result<Mist> {
    raw.parse::<Mist>()
        .with_context(|| format!("Malformed {field} value: {raw:?}"))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Sui fullnode client bound to the swept account's keypair.
pub struct SuiRpcClient {
    http: Client,
    rpc_url: String,
    keypair: SuiKeypair,
    next_id: AtomicU64,
}

impl SuiRpcClient {
    /// Create a new client for `rpc_url` signing with `keypair`.
    pub fn new(rpc_url: impl Into<String>, keypair: SuiKeypair, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("SWEEPER/0.1.0 (sui-sweep-agent)")
            .build()
            .context("Failed to build HTTP client for Sui RPC")?;

        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
            keypair,
            next_id: AtomicU64::new(1),
        })
    }

    /// Address of the account this client signs for.
    pub fn address(&self) -> &str {
        self.keypair.address()
    }

    // -- Internal helpers ------------------------------------------------

    /// Make a JSON-RPC call and unwrap its `result`.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "Sui RPC request");

        let resp = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Sui {method} request failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Sui {method} HTTP error {status}: {body}");
        }

        let envelope: RpcResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Sui {method} response"))?;

        if let Some(err) = envelope.error {
            return Err(SweeperError::Rpc {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            }
            .into());
        }

        envelope
            .result
            .with_context(|| format!("Sui {method} response has no result"))
    }
}

// ---------------------------------------------------------------------------
// LedgerClient trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl LedgerClient for SuiRpcClient {
    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<Mist> {
        let resp: BalanceResponse = self
            .call("suix_getBalance", json!([owner, coin_type]))
            .await?;
        parse_mist("totalBalance", &resp.total_balance)
    }

    async fn get_fund_units(
        &self,
        owner: &str,
        coin_type: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<FundUnitPage> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let page: CoinPage = self
            .call("suix_getCoins", json!([owner, coin_type, cursor, limit]))
            .await?;

        let units = page
            .data
            .into_iter()
            .map(|c| Ok(FundUnit::new(c.coin_object_id, parse_mist("balance", &c.balance)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(FundUnitPage {
            units,
            next_cursor: page.next_cursor,
            has_next_page: page.has_next_page,
        })
    }

    /// Pay `amount` to the destination out of the request's coins.
    ///
    /// The first source coin pays gas; `gas_budget` caps what it may spend.
    async fn transfer(&self, request: &TransferRequest) -> Result<String> {
        if request.sources.is_empty() {
            anyhow::bail!("Transfer has no source coins");
        }

        let tx: TransactionBytes = self
            .call(
                "unsafe_paySui",
                json!([
                    self.address(),
                    request.source_ids(),
                    [request.destination],
                    [request.amount.to_string()],
                    request.gas_budget.to_string(),
                ]),
            )
            .await?;

        let signature = self.keypair.sign_transaction(&tx.tx_bytes)?;

        let executed: ExecuteResponse = self
            .call(
                "sui_executeTransactionBlock",
                json!([
                    tx.tx_bytes,
                    [signature],
                    { "showEffects": true },
                    "WaitForLocalExecution",
                ]),
            )
            .await?;

        let digest = executed
            .digest
            .context("Execution response carries no transaction digest")?;

        if let Some(effects) = executed.effects {
            if effects.status.status != "success" {
                anyhow::bail!(
                    "Transaction {digest} failed on-chain: {}",
                    effects.status.error.unwrap_or(effects.status.status)
                );
            }
        }

        info!(digest = %digest, amount = request.amount, "Transfer executed");
        Ok(digest)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
