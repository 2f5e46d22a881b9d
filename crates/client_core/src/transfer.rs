//! Validation, construction, signing and submission of single-asset transfers.

use std::sync::Arc;

use ledger_rpc::{
    system_transfer, ConfirmError, ConfirmOptions, LedgerClient, Message, RpcError, Transaction,
    TransactionError,
};
use shared::{
    domain::{Address, AmountError, Base58Error, Blockhash, Commitment, Lamports, Signature},
    error::{ErrorKind, ErrorReport, FundsCheck},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::signer::{SigningCapability, WalletError};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Connect a wallet before sending.")]
    NotConnected,
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(#[source] Base58Error),
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[source] AmountError),
    #[error("Insufficient funds: {detail}")]
    InsufficientFunds { stage: FundsCheck, detail: String },
    #[error("The transaction was rejected in the wallet.")]
    UserRejected,
    #[error("The transaction was not confirmed in time: {0}")]
    ConfirmationTimeout(String),
    #[error("A transfer is already in progress.")]
    InFlight,
    #[error("Transfer failed: {0}")]
    Unknown(String),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::NotConnected => ErrorKind::NotConnected,
            TransferError::InvalidRecipient(_) => ErrorKind::InvalidRecipient,
            TransferError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            TransferError::InsufficientFunds { stage, .. } => {
                ErrorKind::InsufficientFunds { stage: *stage }
            }
            TransferError::UserRejected => ErrorKind::UserRejected,
            TransferError::ConfirmationTimeout(_) => ErrorKind::ConfirmationTimeout,
            TransferError::InFlight => ErrorKind::InFlight,
            TransferError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }
}

impl From<WalletError> for TransferError {
    fn from(err: WalletError) -> Self {
        if err.is_user_rejection() {
            TransferError::UserRejected
        } else {
            TransferError::Unknown(err.to_string())
        }
    }
}

impl From<TransactionError> for TransferError {
    fn from(err: TransactionError) -> Self {
        TransferError::Unknown(err.to_string())
    }
}

impl From<ConfirmError> for TransferError {
    fn from(err: ConfirmError) -> Self {
        match err {
            ConfirmError::Expired { .. } | ConfirmError::TimedOut(_) => {
                TransferError::ConfirmationTimeout(err.to_string())
            }
            ConfirmError::Failed(raw) => TransferError::Unknown(raw),
            ConfirmError::Rpc(rpc) => TransferError::Unknown(rpc.to_string()),
        }
    }
}

fn submission_error(err: RpcError) -> TransferError {
    if err.is_insufficient_funds() {
        TransferError::InsufficientFunds {
            stage: FundsCheck::Submission,
            detail: err.to_string(),
        }
    } else {
        TransferError::Unknown(err.to_string())
    }
}

#[derive(Debug)]
pub enum TransferOutcome {
    Success(Signature),
    Failure(TransferError),
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success(_))
    }

    pub fn signature(&self) -> Option<Signature> {
        match self {
            TransferOutcome::Success(signature) => Some(*signature),
            TransferOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&TransferError> {
        match self {
            TransferOutcome::Success(_) => None,
            TransferOutcome::Failure(err) => Some(err),
        }
    }
}

impl From<Result<Signature, TransferError>> for TransferOutcome {
    fn from(result: Result<Signature, TransferError>) -> Self {
        match result {
            Ok(signature) => TransferOutcome::Success(signature),
            Err(err) => TransferOutcome::Failure(err),
        }
    }
}

/// Checks raw form input in order: session, recipient, amount. Runs before any ledger call.
pub fn validate_transfer_input(
    payer: Option<Address>,
    recipient: &str,
    amount: &str,
) -> Result<(Address, Address, Lamports), TransferError> {
    let payer = payer.ok_or(TransferError::NotConnected)?;
    let recipient: Address = recipient
        .trim()
        .parse()
        .map_err(TransferError::InvalidRecipient)?;
    let lamports = Lamports::from_sol_str(amount).map_err(TransferError::InvalidAmount)?;
    Ok((payer, recipient, lamports))
}

/// Everything needed to build one transfer attempt. Never reused across attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferIntent {
    pub payer: Address,
    pub recipient: Address,
    pub lamports: Lamports,
    pub fee_payer: Address,
    pub recent_blockhash: Blockhash,
    pub last_valid_block_height: u64,
}

impl TransferIntent {
    pub fn to_transaction(&self) -> Result<Transaction, TransactionError> {
        let instruction = system_transfer(&self.payer, &self.recipient, self.lamports);
        let message = Message::new(&[instruction], &self.fee_payer, self.recent_blockhash)?;
        Ok(Transaction::new_unsigned(message))
    }
}

/// A signed transfer waiting to be sent, with the intent it was built from.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub wire: Vec<u8>,
    pub intent: TransferIntent,
}

pub struct TransferExecutor {
    ledger: Arc<dyn LedgerClient>,
    confirm: ConfirmOptions,
}

impl TransferExecutor {
    pub fn new(ledger: Arc<dyn LedgerClient>, confirm: ConfirmOptions) -> Self {
        Self { ledger, confirm }
    }

    pub fn confirm_options(&self) -> &ConfirmOptions {
        &self.confirm
    }

    /// Preflight balance check, build and sign. Nothing reaches the ledger's send path.
    pub async fn prepare(
        &self,
        capability: &SigningCapability,
        recipient: Address,
        lamports: Lamports,
    ) -> Result<SignedTransfer, TransferError> {
        let payer = capability.account();
        let balance = self
            .ledger
            .get_balance(&payer)
            .await
            .map_err(|err| TransferError::Unknown(err.to_string()))?;
        if balance < lamports {
            return Err(TransferError::InsufficientFunds {
                stage: FundsCheck::Preflight,
                detail: format!("balance {balance} is below the requested {lamports}"),
            });
        }

        let latest = self
            .ledger
            .get_latest_blockhash(Commitment::Finalized)
            .await
            .map_err(|err| TransferError::Unknown(err.to_string()))?;
        let intent = TransferIntent {
            payer,
            recipient,
            lamports,
            fee_payer: payer,
            recent_blockhash: latest.blockhash,
            last_valid_block_height: latest.last_valid_block_height,
        };
        let unsigned = intent.to_transaction()?;

        let signed = capability.sign_transaction(unsigned).await.map_err(|err| {
            warn!(%payer, "wallet did not sign transfer: {err}");
            TransferError::from(err)
        })?;
        Ok(SignedTransfer {
            wire: signed.serialize()?,
            intent,
        })
    }

    /// Sends a signed transfer and waits for the configured commitment.
    pub async fn submit(&self, signed: SignedTransfer) -> Result<Signature, TransferError> {
        let SignedTransfer { wire, intent } = signed;
        let signature = self
            .ledger
            .send_transaction(&wire)
            .await
            .map_err(submission_error)?;
        info!(
            %signature,
            payer = %intent.payer,
            recipient = %intent.recipient,
            lamports = intent.lamports.0,
            "transfer submitted"
        );

        self.ledger
            .confirm_transaction(&signature, intent.last_valid_block_height, &self.confirm)
            .await?;
        info!(%signature, commitment = self.confirm.commitment.as_str(), "transfer confirmed");
        Ok(signature)
    }
}
