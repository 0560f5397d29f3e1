//! JSON-RPC header source for a live node.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tracing::trace;

use crate::source::{HeaderSource, SourceError, SourceResult};
use crate::types::{BlockHash, BlockNumber, Header, U256};

#[derive(Serialize, Debug)]
struct RpcRequest<'a, T> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: i32,
}

#[derive(Deserialize, Debug)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize, Debug)]
struct RpcError {
    code: i64,
    message: String,
}

/// Header as returned by `eth_getBlockByNumber` / `eth_getBlockByHash`.
///
/// Per-level fields come as arrays with one entry per hierarchy level.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireHeader {
    hash: String,
    parent_hash: Vec<String>,
    state_root: Vec<String>,
    transactions_root: Vec<String>,
    receipts_root: Vec<String>,
    logs_bloom: Vec<String>,
    difficulty: Vec<String>,
    number: Vec<String>,
    gas_limit: Vec<String>,
    gas_used: Vec<String>,
    base_fee_per_gas: Option<Vec<String>>,
    timestamp: String,
    extra_data: String,
    location: String,
    nonce: String,
}

fn bad_data(field: &str, value: &str) -> SourceError {
    SourceError::BadNodeData(format!("invalid {field}: {value:?}"))
}

fn strip(value: &str) -> &str {
    value.trim_start_matches("0x")
}

fn parse_hash(field: &str, value: &str) -> SourceResult<BlockHash> {
    BlockHash::from_hex(value).map_err(|_| bad_data(field, value))
}

fn parse_quantity(field: &str, value: &str) -> SourceResult<u64> {
    let digits = strip(value);
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|_| bad_data(field, value))
}

fn parse_big(field: &str, value: &str) -> SourceResult<U256> {
    let digits = strip(value);
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(digits, 16).map_err(|_| bad_data(field, value))
}

fn parse_bytes(field: &str, value: &str) -> SourceResult<Vec<u8>> {
    hex::decode(strip(value)).map_err(|_| bad_data(field, value))
}

fn parse_all<T>(
    field: &str,
    values: &[String],
    parse: fn(&str, &str) -> SourceResult<T>,
) -> SourceResult<Vec<T>> {
    values.iter().map(|value| parse(field, value)).collect()
}

impl TryFrom<WireHeader> for Header {
    type Error = SourceError;

    fn try_from(wire: WireHeader) -> SourceResult<Self> {
        Ok(Header {
            hash: parse_hash("hash", &wire.hash)?,
            parent_hash: parse_all("parentHash", &wire.parent_hash, parse_hash)?,
            state_root: parse_all("stateRoot", &wire.state_root, parse_hash)?,
            tx_root: parse_all("transactionsRoot", &wire.transactions_root, parse_hash)?,
            receipt_root: parse_all("receiptsRoot", &wire.receipts_root, parse_hash)?,
            bloom: parse_all("logsBloom", &wire.logs_bloom, parse_bytes)?,
            difficulty: parse_all("difficulty", &wire.difficulty, parse_big)?,
            number: parse_all("number", &wire.number, parse_quantity)?,
            gas_limit: parse_all("gasLimit", &wire.gas_limit, parse_quantity)?,
            gas_used: parse_all("gasUsed", &wire.gas_used, parse_quantity)?,
            base_fee: wire
                .base_fee_per_gas
                .as_deref()
                .map(|fees| parse_all("baseFeePerGas", fees, parse_big))
                .transpose()?,
            time: parse_quantity("timestamp", &wire.timestamp)?,
            extra: parse_bytes("extraData", &wire.extra_data)?,
            location: parse_bytes("location", &wire.location)?,
            nonce: parse_quantity("nonce", &wire.nonce)?,
        })
    }
}

/// A [`HeaderSource`] backed by a node's HTTP JSON-RPC endpoint.
#[derive(Debug)]
pub struct JsonRpcSource {
    url: Url,
    client: Client,
    id_counter: AtomicI32,
}

impl JsonRpcSource {
    pub fn new(url: Url) -> SourceResult<Self> {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            url,
            client,
            id_counter: AtomicI32::new(0),
        })
    }

    async fn send_request<T, R>(&self, method: &str, params: T) -> SourceResult<Option<R>>
    where
        T: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        trace!(url = %self.url, method, id, "sending rpc request");

        let response = self.client.post(self.url.clone()).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let response: RpcResponse<R> = serde_json::from_slice(&body)
            .map_err(|e| SourceError::BadNodeData(e.to_string()))?;

        match response.error {
            Some(error) => Err(SourceError::Rpc {
                code: error.code,
                message: error.message,
            }),
            None => Ok(response.result),
        }
    }
}

#[async_trait]
impl HeaderSource for JsonRpcSource {
    async fn current_height(&self) -> SourceResult<BlockNumber> {
        let height: Option<String> = self.send_request("eth_blockNumber", ()).await?;
        match height {
            Some(height) => parse_quantity("blockNumber", &height),
            None => Err(SourceError::BadNodeData(
                "empty eth_blockNumber result".to_string(),
            )),
        }
    }

    async fn header_by_number(&self, number: BlockNumber) -> SourceResult<Option<Header>> {
        let wire: Option<WireHeader> = self
            .send_request("eth_getBlockByNumber", (format!("0x{number:x}"), false))
            .await?;
        wire.map(Header::try_from).transpose()
    }

    async fn header_by_hash(&self, hash: &BlockHash) -> SourceResult<Option<Header>> {
        let wire: Option<WireHeader> = self
            .send_request("eth_getBlockByHash", (hash.to_string(), false))
            .await?;
        wire.map(Header::try_from).transpose()
    }
}
