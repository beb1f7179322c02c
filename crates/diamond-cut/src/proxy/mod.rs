//! Boundary to the network/account layer: enumerate a proxy's routing and
//! submit cuts.

mod mem;
mod rpc;

pub use mem::{MemProxy, RoutingTable};
pub use rpc::RpcProxy;

use async_trait::async_trait;
use diamond_abi::codec::{CutAction, LoupeFacet};
use diamond_abi::{AbiError, Address};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::facet::InitializerSpec;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("transaction {tx} reverted{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted { tx: String, reason: Option<String> },
    #[error("no sender account configured for transactions")]
    NoSender,
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<AbiError> for ProxyError {
    fn from(err: AbiError) -> Self {
        ProxyError::Decode(err.to_string())
    }
}

/// Identifier of a submitted cut transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub String);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx: TxHandle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
}

/// A live diamond proxy.
///
/// `submit_cut` must hand the ledger all actions and the optional initializer
/// as one transaction: either everything takes effect or nothing does.
#[async_trait]
pub trait DiamondProxy: Send + Sync {
    /// Address of the proxy itself.
    fn address(&self) -> Address;

    /// Loupe enumeration: every facet with the selectors it owns.
    async fn facets(&self) -> Result<Vec<LoupeFacet>, ProxyError>;

    async fn submit_cut(
        &self,
        actions: &[CutAction],
        init: Option<&InitializerSpec>,
    ) -> Result<TxHandle, ProxyError>;

    /// Wait until the transaction is included. Reverted transactions are
    /// reported as [`ProxyError::Reverted`].
    async fn wait_confirmed(&self, tx: &TxHandle) -> Result<TxReceipt, ProxyError>;
}

#[async_trait]
impl<P: DiamondProxy + ?Sized> DiamondProxy for std::sync::Arc<P> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn facets(&self) -> Result<Vec<LoupeFacet>, ProxyError> {
        (**self).facets().await
    }

    async fn submit_cut(
        &self,
        actions: &[CutAction],
        init: Option<&InitializerSpec>,
    ) -> Result<TxHandle, ProxyError> {
        (**self).submit_cut(actions, init).await
    }

    async fn wait_confirmed(&self, tx: &TxHandle) -> Result<TxReceipt, ProxyError> {
        (**self).wait_confirmed(tx).await
    }
}
