use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use shared::{
    domain::{Address, Blockhash, Commitment, Lamports, Network, Signature},
    protocol::{
        BlockhashValue, CommitmentConfig, Contextual, RpcRequest, RpcResponse,
        SendTransactionConfig, SignatureInfo, SignatureStatus, SignatureStatusConfig,
        SignaturesForAddressConfig,
    },
};
use tracing::{debug, warn};

use crate::{LatestBlockhash, LedgerClient, RpcError};

/// JSON-RPC over HTTP ledger client.
pub struct RpcLedgerClient {
    http: Client,
    endpoint: String,
    read_commitment: Commitment,
    next_id: AtomicU64,
}

impl RpcLedgerClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_http_client(Client::new(), endpoint)
    }

    pub fn with_http_client(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            read_commitment: Commitment::Confirmed,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn for_network(network: Network) -> Self {
        Self::new(network.rpc_url())
    }

    /// Commitment used for balance and history reads.
    pub fn with_read_commitment(mut self, commitment: Commitment) -> Self {
        self.read_commitment = commitment;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<T, RpcError>
    where
        P: Serialize + Send,
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, endpoint = %self.endpoint, "ledger rpc request");
        let response = self
            .http
            .post(&self.endpoint)
            .json(&RpcRequest::new(id, method, params))
            .send()
            .await?
            .error_for_status()?;
        let body: RpcResponse<T> = response.json().await?;
        if let Some(error) = body.error {
            warn!(method, code = error.code, "ledger rpc error: {}", error.message);
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        body.result
            .ok_or_else(|| RpcError::Malformed(format!("{method}: response has no result")))
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn get_balance(&self, address: &Address) -> Result<Lamports, RpcError> {
        let balance: Contextual<u64> = self
            .call(
                "getBalance",
                json!([
                    address,
                    CommitmentConfig {
                        commitment: self.read_commitment
                    }
                ]),
            )
            .await?;
        Ok(Lamports(balance.value))
    }

    async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<LatestBlockhash, RpcError> {
        let latest: Contextual<BlockhashValue> = self
            .call("getLatestBlockhash", json!([CommitmentConfig { commitment }]))
            .await?;
        let blockhash: Blockhash = latest
            .value
            .blockhash
            .parse()
            .map_err(|err| RpcError::Malformed(format!("getLatestBlockhash: {err}")))?;
        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height: latest.value.last_valid_block_height,
        })
    }

    async fn send_transaction(&self, wire_transaction: &[u8]) -> Result<Signature, RpcError> {
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    STANDARD.encode(wire_transaction),
                    SendTransactionConfig {
                        encoding: "base64".to_string(),
                        preflight_commitment: self.read_commitment,
                        skip_preflight: false,
                    }
                ]),
            )
            .await?;
        signature
            .parse()
            .map_err(|err| RpcError::Malformed(format!("sendTransaction: {err}")))
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let statuses: Contextual<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([
                    [signature],
                    SignatureStatusConfig {
                        search_transaction_history: false
                    }
                ]),
            )
            .await?;
        Ok(statuses.value.into_iter().next().flatten())
    }

    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, RpcError> {
        self.call("getBlockHeight", json!([CommitmentConfig { commitment }]))
            .await
    }

    async fn get_signatures_for_address(
        &self,
        address: &Address,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        self.call(
            "getSignaturesForAddress",
            json!([address, SignaturesForAddressConfig { limit }]),
        )
        .await
    }
}
