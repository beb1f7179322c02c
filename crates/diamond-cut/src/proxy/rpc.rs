use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use diamond_abi::Address;
use diamond_abi::codec::{
    CutAction, LoupeFacet, decode_facets, decode_revert_reason, encode_diamond_cut,
    encode_facets_call,
};
use reqwest::Client;
use serde_json::{Value, json};
use url::Url;

use super::{DiamondProxy, ProxyError, TxHandle, TxReceipt};
use crate::facet::InitializerSpec;

/// Diamond proxy reached over Ethereum JSON-RPC.
///
/// Transactions are sent with `eth_sendTransaction`, so the sender must be an
/// account unlocked on the node (dev chains, forks, or a signing proxy).
pub struct RpcProxy {
    client: Client,
    endpoint: Url,
    proxy: Address,
    from: Option<Address>,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl RpcProxy {
    pub fn new(endpoint: &str, proxy: Address) -> Result<Self, ProxyError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ProxyError::Transport(format!("invalid rpc url '{endpoint}': {e}")))?;
        let client = Client::builder()
            .build()
            .map_err(|e| ProxyError::Transport(format!("build http client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            proxy,
            from: None,
            poll_interval: Duration::from_millis(500),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn with_sender(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProxyError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::trace!(method, id, "rpc request");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProxyError::Transport(format!("{method}: {e}")))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProxyError::Transport(format!("{method}: HTTP {status}: {e}")))?;

        if let Some(error) = payload.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let mut message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            if let Some(reason) = error
                .get("data")
                .and_then(Value::as_str)
                .and_then(|data| decode_hex(data).ok())
                .and_then(|bytes| decode_revert_reason(&bytes))
            {
                message = format!("{message}: {reason}");
            }
            return Err(ProxyError::Rpc { code, message });
        }
        payload
            .get("result")
            .cloned()
            .ok_or_else(|| ProxyError::Decode(format!("{method}: response has neither result nor error")))
    }
}

#[async_trait]
impl DiamondProxy for RpcProxy {
    fn address(&self) -> Address {
        self.proxy
    }

    async fn facets(&self) -> Result<Vec<LoupeFacet>, ProxyError> {
        let call = json!({
            "to": self.proxy.to_hex(),
            "data": encode_hex(&encode_facets_call()),
        });
        let result = self.request("eth_call", json!([call, "latest"])).await?;
        let data = result
            .as_str()
            .ok_or_else(|| ProxyError::Decode("eth_call result is not a string".into()))?;
        Ok(decode_facets(&decode_hex(data)?)?)
    }

    async fn submit_cut(
        &self,
        actions: &[CutAction],
        init: Option<&InitializerSpec>,
    ) -> Result<TxHandle, ProxyError> {
        let from = self.from.ok_or(ProxyError::NoSender)?;
        let (init_address, init_data) = match init {
            Some(init) => (init.target_address, init.calldata()),
            None => (Address::ZERO, Vec::new()),
        };
        let data = encode_diamond_cut(actions, init_address, &init_data);
        let tx = json!({
            "from": from.to_hex(),
            "to": self.proxy.to_hex(),
            "data": encode_hex(&data),
        });
        let result = self.request("eth_sendTransaction", json!([tx])).await?;
        let hash = result
            .as_str()
            .ok_or_else(|| ProxyError::Decode("eth_sendTransaction result is not a string".into()))?;
        tracing::debug!(tx = hash, actions = actions.len(), "diamondCut submitted");
        Ok(TxHandle(hash.to_string()))
    }

    async fn wait_confirmed(&self, tx: &TxHandle) -> Result<TxReceipt, ProxyError> {
        loop {
            let result = self
                .request("eth_getTransactionReceipt", json!([tx.0]))
                .await?;
            if result.is_null() {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            let status = result
                .get("status")
                .and_then(Value::as_str)
                .map(parse_quantity)
                .transpose()?;
            if status == Some(0) {
                return Err(ProxyError::Reverted {
                    tx: tx.0.clone(),
                    reason: None,
                });
            }
            let block_number = result
                .get("blockNumber")
                .and_then(Value::as_str)
                .map(parse_quantity)
                .transpose()?;
            let gas_used = result
                .get("gasUsed")
                .and_then(Value::as_str)
                .map(parse_quantity)
                .transpose()?;
            return Ok(TxReceipt {
                tx: tx.clone(),
                block_number,
                gas_used,
            });
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, ProxyError> {
    let rest = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(rest).map_err(|e| ProxyError::Decode(format!("invalid hex '{s}': {e}")))
}

fn parse_quantity(s: &str) -> Result<u64, ProxyError> {
    let rest = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(rest, 16).map_err(|e| ProxyError::Decode(format!("invalid quantity '{s}': {e}")))
}
