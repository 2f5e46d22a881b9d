//! Bridge host reached over a local JSON-RPC HTTP endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use shared::protocol::{RpcResponse, JSONRPC_VERSION};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::signer::{BridgeHost, WalletError};

pub struct HttpBridgeHost {
    http: Client,
    endpoint: String,
    recognized: bool,
}

impl HttpBridgeHost {
    /// A MetaMask-compatible host.
    pub fn metamask(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            recognized: true,
        }
    }

    /// A host of unknown make; discovery ignores it.
    pub fn generic(endpoint: impl Into<String>) -> Self {
        Self {
            recognized: false,
            ..Self::metamask(endpoint)
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        let id = Uuid::new_v4().to_string();
        debug!(method, %id, endpoint = %self.endpoint, "bridge request");
        let response: RpcResponse<Value> = self
            .http
            .post(&self.endpoint)
            .json(&json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if let Some(error) = response.error {
            warn!(method, code = error.code, "bridge request failed: {}", error.message);
            return Err(WalletError::from_rpc(error.code, error.message));
        }
        response
            .result
            .ok_or_else(|| WalletError::InvalidResponse(format!("{method}: no result")))
    }
}

#[async_trait]
impl BridgeHost for HttpBridgeHost {
    fn is_recognized_bridge(&self) -> bool {
        self.recognized
    }

    async fn request_accounts(&self) -> Result<Vec<String>, WalletError> {
        let raw = self.request("eth_requestAccounts", json!([])).await?;
        serde_json::from_value(raw)
            .map_err(|err| WalletError::InvalidResponse(format!("eth_requestAccounts: {err}")))
    }

    async fn request_snap(&self, snap_id: &str) -> Result<Value, WalletError> {
        let mut snaps = serde_json::Map::new();
        snaps.insert(snap_id.to_string(), json!({}));
        self.request("wallet_requestSnaps", Value::Object(snaps))
            .await
    }

    async fn invoke_snap(
        &self,
        snap_id: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, WalletError> {
        self.request(
            "wallet_invokeSnap",
            json!({
                "snapId": snap_id,
                "request": { "method": method, "params": params },
            }),
        )
        .await
    }
}
