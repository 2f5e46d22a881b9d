//! Signing capabilities produced by a successful wallet handshake.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ledger_rpc::{Transaction, TransactionError};
use serde_json::Value;
use shared::{
    domain::{Address, ConnectionKind, Signature},
    protocol::{SnapSignRequest, SnapSignatureResponse},
};
use thiserror::Error;
use tracing::debug;

/// JSON-RPC error code wallets use when the user dismisses a prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("request was rejected by the user")]
    UserRejected,
    #[error("wallet request failed ({code}): {message}")]
    Request { code: i64, message: String },
    #[error("wallet is not connected")]
    NotConnected,
    #[error("wallet did not return an account")]
    MissingAccount,
    #[error("unexpected wallet response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error("wallet transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl WalletError {
    /// Classifies a JSON-RPC style wallet error.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == USER_REJECTED_CODE || message.to_ascii_lowercase().contains("rejected") {
            WalletError::UserRejected
        } else {
            WalletError::Request { code, message }
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, WalletError::UserRejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectOptions {
    /// Only connect when the wallet already trusts this application; never prompt.
    pub only_if_trusted: bool,
}

/// Brand flag a native wallet advertises about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeBrand {
    Phantom,
    Solflare,
    Backpack,
    Glow,
    Unrecognized,
}

impl NativeBrand {
    pub fn label(self) -> &'static str {
        match self {
            NativeBrand::Phantom => "Phantom",
            NativeBrand::Solflare => "Solflare",
            NativeBrand::Backpack => "Backpack",
            NativeBrand::Glow => "Glow",
            NativeBrand::Unrecognized => "Solana Wallet",
        }
    }
}

/// A wallet that speaks the ledger's signing protocol directly.
#[async_trait]
pub trait NativeWallet: Send + Sync {
    fn brand(&self) -> NativeBrand;
    async fn connect(&self, options: ConnectOptions) -> Result<(), WalletError>;
    async fn disconnect(&self) -> Result<(), WalletError>;
    fn public_key(&self) -> Option<Address>;
    async fn sign_transaction(&self, transaction: Transaction)
        -> Result<Transaction, WalletError>;
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError>;
}

/// A general-purpose extension host that reaches the ledger through an installable snap.
#[async_trait]
pub trait BridgeHost: Send + Sync {
    /// True when the host is the bridge this client knows how to drive.
    fn is_recognized_bridge(&self) -> bool;
    async fn request_accounts(&self) -> Result<Vec<String>, WalletError>;
    /// Asks the host to install or enable `snap_id`; returns the host's map of enabled snaps.
    async fn request_snap(&self, snap_id: &str) -> Result<Value, WalletError>;
    async fn invoke_snap(
        &self,
        snap_id: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, WalletError>;
}

#[derive(Clone)]
pub struct NativeSigner {
    wallet: Arc<dyn NativeWallet>,
    account: Address,
}

impl NativeSigner {
    pub(crate) fn new(wallet: Arc<dyn NativeWallet>, account: Address) -> Self {
        Self { wallet, account }
    }

    pub async fn disconnect(&self) -> Result<(), WalletError> {
        self.wallet.disconnect().await
    }
}

#[derive(Clone)]
pub struct BridgedSigner {
    host: Arc<dyn BridgeHost>,
    snap_id: String,
    account: Address,
}

impl BridgedSigner {
    pub(crate) fn new(
        host: Arc<dyn BridgeHost>,
        snap_id: impl Into<String>,
        account: Address,
    ) -> Self {
        Self {
            host,
            snap_id: snap_id.into(),
            account,
        }
    }

    pub fn snap_id(&self) -> &str {
        &self.snap_id
    }

    async fn invoke_signing(&self, method: &str, payload: &[u8]) -> Result<Signature, WalletError> {
        let request = SnapSignRequest {
            message: STANDARD.encode(payload),
            signer: Some(self.account),
        };
        let params = serde_json::to_value(&request)
            .map_err(|err| WalletError::InvalidResponse(err.to_string()))?;
        debug!(snap_id = %self.snap_id, method, "invoking snap signer");
        let raw = self.host.invoke_snap(&self.snap_id, method, params).await?;
        let response: SnapSignatureResponse = serde_json::from_value(raw)
            .map_err(|err| WalletError::InvalidResponse(format!("{method}: {err}")))?;
        response
            .signature
            .ok_or_else(|| WalletError::InvalidResponse(format!("{method}: no signature")))?
            .parse()
            .map_err(|err| WalletError::InvalidResponse(format!("{method}: {err}")))
    }
}

/// Unified handle over the two kinds of signer a session can hold.
#[derive(Clone)]
pub enum SigningCapability {
    Native(NativeSigner),
    Bridged(BridgedSigner),
}

impl SigningCapability {
    pub fn connection_kind(&self) -> ConnectionKind {
        match self {
            SigningCapability::Native(_) => ConnectionKind::Native,
            SigningCapability::Bridged(_) => ConnectionKind::Bridged,
        }
    }

    pub fn account(&self) -> Address {
        match self {
            SigningCapability::Native(signer) => signer.account,
            SigningCapability::Bridged(signer) => signer.account,
        }
    }

    pub async fn sign_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, WalletError> {
        let signed = match self {
            SigningCapability::Native(signer) => signer.wallet.sign_transaction(transaction).await?,
            SigningCapability::Bridged(signer) => {
                let mut transaction = transaction;
                let signature = signer
                    .invoke_signing("signTransaction", &transaction.message_data())
                    .await?;
                transaction.add_signature(&signer.account, signature)?;
                transaction
            }
        };
        if !signed.is_fully_signed() {
            return Err(WalletError::InvalidResponse(
                "wallet returned an unsigned transaction".into(),
            ));
        }
        Ok(signed)
    }

    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        match self {
            SigningCapability::Native(signer) => signer.wallet.sign_message(message).await,
            SigningCapability::Bridged(signer) => {
                signer.invoke_signing("signMessage", message).await
            }
        }
    }
}
