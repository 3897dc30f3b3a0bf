//! JSON-RPC chain client
//!
//! Talks plain Ethereum JSON-RPC over HTTP:
//! 1. `eth_chainId` on init
//! 2. `eth_blockNumber` to probe custom providers
//! 3. `eth_call` against the DAY token for balance and minting power

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::chain::{ChainClient, ChainError, DayBalance};
use super::NetworkDescriptor;
use crate::crypto::{keccak256, normalize_address};

/// DAY has 18 decimals
const DAY_DECIMALS: u32 = 18;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

pub struct JsonRpcChain {
    endpoint: String,
    client: reqwest::Client,
}

impl JsonRpcChain {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, ChainError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .client
            .post(endpoint)
            .json(&request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChainError::Rpc(format!("HTTP {}", response.status())));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(ChainError::Rpc(format!("{} ({})", error.message, error.code)));
        }

        body.result
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method}: missing result")))
    }

    async fn eth_call(&self, endpoint: &str, to: &str, data: String) -> Result<u128, ChainError> {
        let result = self
            .call(
                endpoint,
                "eth_call",
                json!([{ "to": to, "data": data }, "latest"]),
                REQUEST_TIMEOUT,
            )
            .await?;
        parse_quantity(&result)
    }
}

#[async_trait]
impl ChainClient for JsonRpcChain {
    async fn init(&self) -> Result<u64, ChainError> {
        let result = self
            .call(&self.endpoint, "eth_chainId", json!([]), REQUEST_TIMEOUT)
            .await?;
        let chain_id = parse_quantity(&result)? as u64;
        info!(endpoint = %self.endpoint, chain_id, "Connected to chain");
        Ok(chain_id)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn test_provider(&self, endpoint: &str) -> bool {
        match self
            .call(endpoint, "eth_blockNumber", json!([]), PROBE_TIMEOUT)
            .await
            .and_then(|v| parse_quantity(&v))
        {
            Ok(block) => {
                debug!(endpoint, block, "Provider answered");
                true
            }
            Err(e) => {
                warn!(endpoint, error = %e, "Provider probe failed");
                false
            }
        }
    }

    async fn day_balance(
        &self,
        network: &NetworkDescriptor,
        address: &str,
    ) -> Result<DayBalance, ChainError> {
        let token = network
            .day_token_address
            .as_deref()
            .ok_or(ChainError::UnsupportedNetwork(network.id))?;

        let raw_balance = self
            .eth_call(&network.endpoint, token, encode_address_call("balanceOf(address)", address)?)
            .await?;
        let minting_power = self
            .eth_call(
                &network.endpoint,
                token,
                encode_address_call("getMintingPowerByAddress(address)", address)?,
            )
            .await?;

        let balance = whole_tokens(raw_balance)?;
        debug!(address, balance, minting_power, "Fetched DAY balance");

        Ok(DayBalance {
            balance,
            minting_power,
        })
    }
}

/// ABI-encode a single-address call: selector followed by the left-padded address.
pub fn encode_address_call(signature: &str, address: &str) -> Result<String, ChainError> {
    let selector = &keccak256(signature.as_bytes())[..4];
    let normalized = normalize_address(address);
    let bare = &normalized[2..];
    if bare.len() != 40 || hex::decode(bare).is_err() {
        return Err(ChainError::InvalidResponse(format!("not an address: {address}")));
    }
    Ok(format!("0x{}{:0>64}", hex::encode(selector), bare))
}

/// Convert a raw 18-decimal amount to whole DAY.
pub fn whole_tokens(raw: u128) -> Result<u64, ChainError> {
    u64::try_from(raw / 10u128.pow(DAY_DECIMALS))
        .map_err(|_| ChainError::InvalidResponse(format!("DAY balance out of range: {raw}")))
}

/// Parse a hex quantity or 32-byte return word.
pub fn parse_quantity(value: &Value) -> Result<u128, ChainError> {
    let text = value
        .as_str()
        .ok_or_else(|| ChainError::InvalidResponse(format!("expected hex string, got {value}")))?;
    let bare = text.strip_prefix("0x").unwrap_or(text);
    let digits = bare.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("{text}: {e}")))
}
