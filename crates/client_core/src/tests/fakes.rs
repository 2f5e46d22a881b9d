//! In-memory stand-ins for wallets, bridge hosts, the ledger and the price feed.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex as StdMutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ledger_rpc::{ConfirmOptions, LatestBlockhash, LedgerClient, RpcError, Transaction};
use serde_json::{json, Value};
use shared::{
    domain::{Address, Blockhash, Commitment, Lamports, Signature},
    error::HandshakeStep,
    protocol::{SignatureInfo, SignatureStatus},
};
use tokio::sync::Notify;

use crate::{
    controller::{ControllerOptions, WalletController},
    negotiator::WalletChooser,
    price::{PriceFeed, PriceQuote},
    provider::{StaticHostEnvironment, WalletOption},
    signer::{BridgeHost, ConnectOptions, NativeBrand, NativeWallet, WalletError},
};

pub const FAKE_SIGNATURE: Signature = Signature::new([7u8; 64]);
pub const SNAP_ID: &str = "npm:test-snap";

pub fn account(seed: u8) -> Address {
    Address::new([seed; 32])
}

pub struct FakeNativeWallet {
    brand: NativeBrand,
    address: Address,
    trusted: bool,
    reveal_key: bool,
    reject_signing: bool,
    fail_disconnect: bool,
    sign_gate: Option<Arc<Notify>>,
    connected: AtomicBool,
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    pub sign_calls: AtomicUsize,
}

impl FakeNativeWallet {
    pub fn new(brand: NativeBrand, address: Address) -> Self {
        Self {
            brand,
            address,
            trusted: false,
            reveal_key: true,
            reject_signing: false,
            fail_disconnect: false,
            sign_gate: None,
            connected: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
        }
    }

    pub fn trusted(mut self) -> Self {
        self.trusted = true;
        self
    }

    pub fn without_public_key(mut self) -> Self {
        self.reveal_key = false;
        self
    }

    pub fn rejecting_signatures(mut self) -> Self {
        self.reject_signing = true;
        self
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.sign_gate = Some(gate);
        self
    }
}

#[async_trait]
impl NativeWallet for FakeNativeWallet {
    fn brand(&self) -> NativeBrand {
        self.brand
    }

    async fn connect(&self, options: ConnectOptions) -> Result<(), WalletError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if options.only_if_trusted && !self.trusted {
            return Err(WalletError::UserRejected);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(WalletError::Request {
                code: -1,
                message: "extension went away".into(),
            });
        }
        Ok(())
    }

    fn public_key(&self) -> Option<Address> {
        (self.reveal_key && self.connected.load(Ordering::SeqCst)).then_some(self.address)
    }

    async fn sign_transaction(
        &self,
        mut transaction: Transaction,
    ) -> Result<Transaction, WalletError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.sign_gate {
            gate.notified().await;
        }
        if self.reject_signing {
            return Err(WalletError::from_rpc(4001, "User rejected the request."));
        }
        transaction.add_signature(&self.address, FAKE_SIGNATURE)?;
        Ok(transaction)
    }

    async fn sign_message(&self, _message: &[u8]) -> Result<Signature, WalletError> {
        Ok(FAKE_SIGNATURE)
    }
}

/// Bridge host scripted to succeed or to fail at one handshake step.
pub struct FakeBridge {
    recognized: bool,
    fail_at: Option<HandshakeStep>,
    snap_public_key: Option<String>,
    pub calls: StdMutex<Vec<(String, Value)>>,
}

impl FakeBridge {
    pub fn new(snap_account: Address) -> Self {
        Self {
            recognized: true,
            fail_at: None,
            snap_public_key: Some(snap_account.to_string()),
            calls: StdMutex::new(Vec::new()),
        }
    }

    pub fn unrecognized(mut self) -> Self {
        self.recognized = false;
        self
    }

    pub fn failing_at(mut self, step: HandshakeStep) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn with_snap_public_key(mut self, key: Option<&str>) -> Self {
        self.snap_public_key = key.map(str::to_string);
        self
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .map(|(method, _)| method.clone())
            .collect()
    }

    fn record(&self, method: &str, params: Value) {
        self.calls
            .lock()
            .expect("calls")
            .push((method.to_string(), params));
    }
}

#[async_trait]
impl BridgeHost for FakeBridge {
    fn is_recognized_bridge(&self) -> bool {
        self.recognized
    }

    async fn request_accounts(&self) -> Result<Vec<String>, WalletError> {
        self.record("eth_requestAccounts", Value::Null);
        if self.fail_at == Some(HandshakeStep::RequestHostAccounts) {
            return Err(WalletError::from_rpc(4001, "User rejected the request."));
        }
        Ok(vec!["0xabc".to_string()])
    }

    async fn request_snap(&self, snap_id: &str) -> Result<Value, WalletError> {
        self.record("wallet_requestSnaps", json!(snap_id));
        if self.fail_at == Some(HandshakeStep::RequestBridgeInstallation) {
            return Ok(json!({}));
        }
        let mut installed = serde_json::Map::new();
        installed.insert(snap_id.to_string(), json!({ "enabled": true }));
        Ok(Value::Object(installed))
    }

    async fn invoke_snap(
        &self,
        _snap_id: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, WalletError> {
        self.record(method, params);
        match method {
            "connect" => {
                if self.fail_at == Some(HandshakeStep::InvokeBridgeConnect) {
                    return Err(WalletError::Request {
                        code: -32603,
                        message: "snap crashed".into(),
                    });
                }
                Ok(json!({ "publicKey": self.snap_public_key }))
            }
            "signTransaction" | "signMessage" => {
                Ok(json!({ "signature": FAKE_SIGNATURE.to_string() }))
            }
            other => Err(WalletError::InvalidResponse(format!("unexpected {other}"))),
        }
    }
}

/// Ledger with a fixed balance that finalizes every submission immediately.
pub struct FakeLedger {
    balance: Lamports,
    send_error: Option<String>,
    pub calls: StdMutex<Vec<&'static str>>,
    pub sent: StdMutex<Vec<Vec<u8>>>,
}

impl FakeLedger {
    pub fn with_balance(balance: Lamports) -> Self {
        Self {
            balance,
            send_error: None,
            calls: StdMutex::new(Vec::new()),
            sent: StdMutex::new(Vec::new()),
        }
    }

    pub fn rejecting_sends(mut self, message: &str) -> Self {
        self.send_error = Some(message.to_string());
        self
    }

    fn record(&self, method: &'static str) {
        self.calls.lock().expect("calls").push(method);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|call| **call == method).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().expect("calls").clear();
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn get_balance(&self, _address: &Address) -> Result<Lamports, RpcError> {
        self.record("getBalance");
        Ok(self.balance)
    }

    async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<LatestBlockhash, RpcError> {
        assert_eq!(commitment, Commitment::Finalized);
        self.record("getLatestBlockhash");
        Ok(LatestBlockhash {
            blockhash: Blockhash::new([4u8; 32]),
            last_valid_block_height: 1_000,
        })
    }

    async fn send_transaction(&self, wire_transaction: &[u8]) -> Result<Signature, RpcError> {
        self.record("sendTransaction");
        if let Some(message) = &self.send_error {
            return Err(RpcError::Rpc {
                code: -32002,
                message: message.clone(),
                data: None,
            });
        }
        self.sent
            .lock()
            .expect("sent")
            .push(wire_transaction.to_vec());
        Ok(FAKE_SIGNATURE)
    }

    async fn get_signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        self.record("getSignatureStatuses");
        Ok(Some(SignatureStatus {
            slot: 12,
            confirmations: None,
            err: None,
            confirmation_status: Some(Commitment::Finalized),
        }))
    }

    async fn get_block_height(&self, _commitment: Commitment) -> Result<u64, RpcError> {
        self.record("getBlockHeight");
        Ok(900)
    }

    async fn get_signatures_for_address(
        &self,
        _address: &Address,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>, RpcError> {
        self.record("getSignaturesForAddress");
        let entries = [
            SignatureInfo {
                signature: FAKE_SIGNATURE,
                slot: 12,
                err: None,
                memo: None,
                block_time: Some(1_700_000_000),
                confirmation_status: Some(Commitment::Finalized),
            },
            SignatureInfo {
                signature: Signature::new([6u8; 64]),
                slot: 11,
                err: Some(json!({"InstructionError": [0, "Custom"]})),
                memo: Some("rent".into()),
                block_time: None,
                confirmation_status: Some(Commitment::Finalized),
            },
        ];
        Ok(entries.into_iter().take(limit).collect())
    }
}

/// Returns queued prices in order, then fails.
pub struct ScriptedPriceFeed {
    prices: StdMutex<VecDeque<Option<f64>>>,
}

impl ScriptedPriceFeed {
    pub fn new(prices: Vec<Option<f64>>) -> Self {
        Self {
            prices: StdMutex::new(prices.into()),
        }
    }
}

#[async_trait]
impl PriceFeed for ScriptedPriceFeed {
    async fn fetch_usd_price(&self) -> Result<PriceQuote> {
        match self.prices.lock().expect("prices").pop_front().flatten() {
            Some(price) => Ok(PriceQuote::new(price)),
            None => Err(anyhow!("price feed offline")),
        }
    }
}

pub struct FixedChooser {
    pub choice: Option<usize>,
    pub offered: StdMutex<Vec<String>>,
}

impl FixedChooser {
    pub fn new(choice: Option<usize>) -> Self {
        Self {
            choice,
            offered: StdMutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WalletChooser for FixedChooser {
    async fn choose(&self, options: &[WalletOption]) -> Option<usize> {
        *self.offered.lock().expect("offered") = options
            .iter()
            .map(|option| option.display_name.clone())
            .collect();
        self.choice
    }
}

pub fn fast_controller_options() -> ControllerOptions {
    ControllerOptions {
        snap_id: SNAP_ID.to_string(),
        confirm: ConfirmOptions {
            commitment: Commitment::Finalized,
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_secs(2),
        },
        ..ControllerOptions::default()
    }
}

pub fn controller(host: StaticHostEnvironment, ledger: Arc<FakeLedger>) -> Arc<WalletController> {
    WalletController::new_with_dependencies(
        Arc::new(host),
        ledger,
        Arc::new(ScriptedPriceFeed::new(vec![Some(150.0)])),
        fast_controller_options(),
    )
}
