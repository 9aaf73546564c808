//! Chain access: sequence numbers, balances, message submission.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use ton_cell::{Address, BagOfCells};
use ton_jetton::{JettonWalletData, StackValue};

use crate::error::{ChainError, ChainResult};

/// Read and write access to the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current wallet seqno. Wallets that are not deployed yet report 0.
    async fn seqno(&self, address: &Address) -> ChainResult<u32>;

    /// Native balance in nanotons.
    async fn balance(&self, address: &Address) -> ChainResult<u128>;

    /// `get_wallet_data` of a jetton wallet contract.
    async fn jetton_wallet_data(&self, jetton_wallet: &Address) -> ChainResult<JettonWalletData>;

    /// Broadcast a serialized external message.
    async fn send_boc(&self, boc: &[u8]) -> ChainResult<()>;
}

/// Exit codes toncenter reports for get methods on an account with no code.
const UNINITIALIZED_EXIT_CODES: [i64; 2] = [-13, -14];

/// toncenter v2 JSON envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GetMethodResult {
    exit_code: i64,
    #[serde(default)]
    stack: Vec<Value>,
}

/// [`ChainClient`] for the toncenter v2 HTTP API.
#[derive(Debug, Clone)]
pub struct ToncenterClient {
    endpoint: String,
    api_key: Option<String>,
    http: Client,
}

impl ToncenterClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> ChainResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("X-API-Key", key),
            None => builder,
        }
    }

    async fn call(&self, builder: reqwest::RequestBuilder) -> ChainResult<Value> {
        let response = self.request(builder).send().await?;
        let status = response.status();
        let body = response.text().await?;
        let envelope: Envelope = serde_json::from_str(&body).map_err(|e| {
            ChainError::InvalidResponse(format!("HTTP {status}, unparseable body: {e}"))
        })?;
        if !envelope.ok {
            let message = envelope.error.unwrap_or_else(|| status.to_string());
            let code = envelope.code.unwrap_or(status.as_u16() as i64);
            warn!(code, %message, "toncenter request failed");
            return Err(ChainError::Rejected { code, message });
        }
        envelope
            .result
            .ok_or_else(|| ChainError::InvalidResponse("missing result".into()))
    }

    async fn run_get_method(&self, address: &Address, method: &str) -> ChainResult<GetMethodResult> {
        let url = format!("{}/runGetMethod", self.endpoint);
        let body = json!({ "address": address.to_raw(), "method": method, "stack": [] });
        let result = self.call(self.http.post(url).json(&body)).await?;
        serde_json::from_value(result)
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")))
    }
}

#[async_trait]
impl ChainClient for ToncenterClient {
    async fn seqno(&self, address: &Address) -> ChainResult<u32> {
        let result = self.run_get_method(address, "seqno").await?;
        if UNINITIALIZED_EXIT_CODES.contains(&result.exit_code) {
            debug!(address = %address, exit_code = result.exit_code, "Wallet not deployed, seqno 0");
            return Ok(0);
        }
        if result.exit_code != 0 {
            return Err(ChainError::Rejected {
                code: result.exit_code,
                message: "seqno get method failed".into(),
            });
        }
        let stack = parse_stack(&result.stack)?;
        match stack.first() {
            Some(StackValue::Int(value)) => u32::try_from(*value)
                .map_err(|_| ChainError::InvalidResponse(format!("seqno {value} out of range"))),
            _ => Err(ChainError::InvalidResponse("seqno stack is not an int".into())),
        }
    }

    async fn balance(&self, address: &Address) -> ChainResult<u128> {
        let url = format!("{}/getAddressBalance", self.endpoint);
        let raw = address.to_raw();
        let result = self
            .call(self.http.get(url).query(&[("address", raw.as_str())]))
            .await?;
        let text = match &result {
            Value::String(text) => text.clone(),
            Value::Number(number) => number.to_string(),
            other => {
                return Err(ChainError::InvalidResponse(format!(
                    "balance is not a number: {other}"
                )));
            }
        };
        text.parse()
            .map_err(|_| ChainError::InvalidResponse(format!("balance {text:?} is not an integer")))
    }

    async fn jetton_wallet_data(&self, jetton_wallet: &Address) -> ChainResult<JettonWalletData> {
        let result = self.run_get_method(jetton_wallet, "get_wallet_data").await?;
        if result.exit_code != 0 {
            return Err(ChainError::Rejected {
                code: result.exit_code,
                message: "get_wallet_data failed".into(),
            });
        }
        let stack = parse_stack(&result.stack)?;
        JettonWalletData::from_stack(&stack)
            .map_err(|e| ChainError::InvalidResponse(format!("get_wallet_data: {e}")))
    }

    async fn send_boc(&self, boc: &[u8]) -> ChainResult<()> {
        let url = format!("{}/sendBoc", self.endpoint);
        let body = json!({ "boc": STANDARD.encode(boc) });
        self.call(self.http.post(url).json(&body)).await?;
        debug!(bytes = boc.len(), "Message accepted by toncenter");
        Ok(())
    }
}

/// Decode toncenter's `[["num", "0x.."], ["cell", {"bytes": ..}], ...]` stack.
fn parse_stack(entries: &[Value]) -> ChainResult<Vec<StackValue>> {
    entries.iter().map(parse_stack_entry).collect()
}

fn parse_stack_entry(entry: &Value) -> ChainResult<StackValue> {
    let invalid = || ChainError::InvalidResponse(format!("unsupported stack entry {entry}"));
    let pair = entry.as_array().filter(|pair| pair.len() == 2).ok_or_else(invalid)?;
    let kind = pair[0].as_str().ok_or_else(invalid)?;

    match kind {
        "num" => {
            let text = pair[1].as_str().ok_or_else(invalid)?;
            let digits = text.strip_prefix("0x").ok_or_else(invalid)?;
            let value = u128::from_str_radix(digits, 16).map_err(|_| invalid())?;
            Ok(StackValue::Int(value))
        }
        "cell" | "slice" => {
            let bytes = pair[1]
                .get("bytes")
                .and_then(Value::as_str)
                .ok_or_else(invalid)?;
            let boc = BagOfCells::deserialize_from_base64(bytes)
                .map_err(|e| ChainError::InvalidResponse(format!("stack cell: {e}")))?;
            Ok(StackValue::Cell(Arc::clone(boc.single_root().map_err(|e| {
                ChainError::InvalidResponse(format!("stack cell: {e}"))
            })?)))
        }
        _ => Err(invalid()),
    }
}
