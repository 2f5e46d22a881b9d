use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use serde_json::json;
use shared::{
    domain::{Address, Commitment, Lamports, Signature},
    protocol::{SignatureInfo, SignatureStatus},
};
use tokio::sync::Mutex;

use crate::{ConfirmError, ConfirmOptions, LatestBlockhash, LedgerClient, RpcError};

struct ScriptedLedger {
    statuses: Mutex<VecDeque<Option<SignatureStatus>>>,
    block_height: u64,
}

impl ScriptedLedger {
    fn new(statuses: Vec<Option<SignatureStatus>>, block_height: u64) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            block_height,
        }
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn get_balance(&self, _address: &Address) -> Result<Lamports, RpcError> {
        Ok(Lamports::ZERO)
    }

    async fn get_latest_blockhash(
        &self,
        _commitment: Commitment,
    ) -> Result<LatestBlockhash, RpcError> {
        Err(RpcError::Malformed("not scripted".into()))
    }

    async fn send_transaction(&self, _wire: &[u8]) -> Result<Signature, RpcError> {
        Err(RpcError::Malformed("not scripted".into()))
    }

    async fn get_signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        Ok(self.statuses.lock().await.pop_front().flatten())
    }

    async fn get_block_height(&self, _commitment: Commitment) -> Result<u64, RpcError> {
        Ok(self.block_height)
    }

    async fn get_signatures_for_address(
        &self,
        _address: &Address,
        _limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        Ok(Vec::new())
    }
}

fn status(level: Commitment) -> SignatureStatus {
    SignatureStatus {
        slot: 10,
        confirmations: Some(1),
        err: None,
        confirmation_status: Some(level),
    }
}

fn fast_options(timeout: Duration) -> ConfirmOptions {
    ConfirmOptions {
        commitment: Commitment::Finalized,
        poll_interval: Duration::from_millis(1),
        timeout,
    }
}

#[tokio::test]
async fn waits_until_finalized() {
    let ledger = ScriptedLedger::new(
        vec![
            None,
            Some(status(Commitment::Processed)),
            Some(status(Commitment::Confirmed)),
            Some(status(Commitment::Finalized)),
        ],
        5,
    );
    let confirmed = ledger
        .confirm_transaction(
            &Signature::new([1u8; 64]),
            100,
            &fast_options(Duration::from_secs(5)),
        )
        .await
        .expect("finalized");
    assert_eq!(confirmed.confirmation_status, Some(Commitment::Finalized));
    assert!(ledger.statuses.lock().await.is_empty());
}

#[tokio::test]
async fn confirmed_level_is_enough_when_requested() {
    let ledger = ScriptedLedger::new(vec![Some(status(Commitment::Confirmed))], 5);
    let options = ConfirmOptions {
        commitment: Commitment::Confirmed,
        ..fast_options(Duration::from_secs(5))
    };
    ledger
        .confirm_transaction(&Signature::new([1u8; 64]), 100, &options)
        .await
        .expect("confirmed");
}

#[tokio::test]
async fn rooted_status_without_level_counts_as_finalized() {
    let rooted = SignatureStatus {
        slot: 10,
        confirmations: None,
        err: None,
        confirmation_status: None,
    };
    let ledger = ScriptedLedger::new(vec![Some(rooted)], 5);
    ledger
        .confirm_transaction(
            &Signature::new([1u8; 64]),
            100,
            &fast_options(Duration::from_secs(5)),
        )
        .await
        .expect("rooted");
}

#[tokio::test]
async fn reports_on_chain_failure() {
    let mut failed = status(Commitment::Confirmed);
    failed.err = Some(json!({"InstructionError": [0, "Custom"]}));
    let ledger = ScriptedLedger::new(vec![Some(failed)], 5);
    let err = ledger
        .confirm_transaction(
            &Signature::new([1u8; 64]),
            100,
            &fast_options(Duration::from_secs(5)),
        )
        .await
        .expect_err("failed");
    assert!(matches!(err, ConfirmError::Failed(ref raw) if raw.contains("InstructionError")));
}

#[tokio::test]
async fn expires_once_block_height_passes_validity_bound() {
    let ledger = ScriptedLedger::new(Vec::new(), 101);
    let err = ledger
        .confirm_transaction(
            &Signature::new([1u8; 64]),
            100,
            &fast_options(Duration::from_secs(5)),
        )
        .await
        .expect_err("expired");
    assert!(matches!(
        err,
        ConfirmError::Expired {
            block_height: 101,
            last_valid_block_height: 100
        }
    ));
}

#[tokio::test]
async fn gives_up_after_wall_clock_timeout() {
    let ledger = ScriptedLedger::new(Vec::new(), 5);
    let err = ledger
        .confirm_transaction(
            &Signature::new([1u8; 64]),
            100,
            &fast_options(Duration::from_millis(30)),
        )
        .await
        .expect_err("timeout");
    assert!(matches!(err, ConfirmError::TimedOut(_)));
}
