use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::{Address, Blockhash, Commitment, Lamports, Signature},
    protocol::{SignatureInfo, SignatureStatus},
};
use thiserror::Error;

pub mod confirm;
pub mod rpc;
pub mod transaction;

pub use confirm::{ConfirmError, ConfirmOptions};
pub use rpc::RpcLedgerClient;
pub use transaction::{
    system_transfer, AccountMeta, Instruction, Message, Transaction, TransactionError,
};

const INSUFFICIENT_FUNDS_MARKERS: &[&str] = &[
    "insufficient funds",
    "insufficient lamports",
    "attempt to debit an account but found no record of a prior credit",
];

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("ledger transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("ledger rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

impl RpcError {
    /// True when the ledger rejected the submission because the payer cannot cover it.
    pub fn is_insufficient_funds(&self) -> bool {
        let haystack = match self {
            RpcError::Rpc { message, data, .. } => {
                let data = data.as_ref().map(Value::to_string).unwrap_or_default();
                format!("{message} {data}")
            }
            RpcError::Transport(_) | RpcError::Malformed(_) => return false,
        }
        .to_ascii_lowercase();
        INSUFFICIENT_FUNDS_MARKERS
            .iter()
            .any(|marker| haystack.contains(marker))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: Blockhash,
    pub last_valid_block_height: u64,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_balance(&self, address: &Address) -> Result<Lamports, RpcError>;
    async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<LatestBlockhash, RpcError>;
    async fn send_transaction(&self, wire_transaction: &[u8]) -> Result<Signature, RpcError>;
    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError>;
    async fn get_block_height(&self, commitment: Commitment) -> Result<u64, RpcError>;
    async fn get_signatures_for_address(
        &self,
        address: &Address,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError>;

    /// Waits until `signature` reaches `options.commitment`, bounded by the blockhash
    /// validity window and `options.timeout`.
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        last_valid_block_height: u64,
        options: &ConfirmOptions,
    ) -> Result<SignatureStatus, ConfirmError> {
        confirm::poll_confirmation(self, signature, last_valid_block_height, options).await
    }
}

#[cfg(test)]
#[path = "tests/transaction_tests.rs"]
mod transaction_tests;

#[cfg(test)]
#[path = "tests/confirm_tests.rs"]
mod confirm_tests;

#[cfg(test)]
#[path = "tests/rpc_tests.rs"]
mod rpc_tests;
