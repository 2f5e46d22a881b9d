use std::time::Duration;

use shared::{
    domain::{Commitment, Signature},
    protocol::SignatureStatus,
};
use thiserror::Error;
use tracing::debug;

use crate::{LedgerClient, RpcError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOptions {
    pub commitment: Commitment,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            commitment: Commitment::Finalized,
            poll_interval: Duration::from_millis(800),
            timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error("transaction failed on-chain: {0}")]
    Failed(String),
    #[error(
        "blockhash expired: block height {block_height} passed last valid height \
         {last_valid_block_height}"
    )]
    Expired {
        block_height: u64,
        last_valid_block_height: u64,
    },
    #[error("confirmation timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Commitment the ledger reports for `status`. Rooted statuses carry no confirmation count.
pub fn reached_commitment(status: &SignatureStatus) -> Commitment {
    status
        .confirmation_status
        .unwrap_or(match status.confirmations {
            None => Commitment::Finalized,
            Some(_) => Commitment::Processed,
        })
}

pub async fn poll_confirmation<C: LedgerClient + ?Sized>(
    client: &C,
    signature: &Signature,
    last_valid_block_height: u64,
    options: &ConfirmOptions,
) -> Result<SignatureStatus, ConfirmError> {
    let poll = wait_for_commitment(client, signature, last_valid_block_height, options);
    match tokio::time::timeout(options.timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(ConfirmError::TimedOut(options.timeout)),
    }
}

async fn wait_for_commitment<C: LedgerClient + ?Sized>(
    client: &C,
    signature: &Signature,
    last_valid_block_height: u64,
    options: &ConfirmOptions,
) -> Result<SignatureStatus, ConfirmError> {
    loop {
        if let Some(status) = client.get_signature_status(signature).await? {
            if let Some(err) = &status.err {
                return Err(ConfirmError::Failed(err.to_string()));
            }
            let reached = reached_commitment(&status);
            debug!(%signature, reached = reached.as_str(), "signature status");
            if reached >= options.commitment {
                return Ok(status);
            }
        }

        let block_height = client.get_block_height(Commitment::Confirmed).await?;
        if block_height > last_valid_block_height {
            return Err(ConfirmError::Expired {
                block_height,
                last_valid_block_height,
            });
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}
