//! The wallet session controller: owns the session and drives discovery, connection,
//! balance, price and transfer operations.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use ledger_rpc::{ConfirmOptions, LedgerClient, RpcError, RpcLedgerClient};
use serde::Serialize;
use shared::{
    domain::{Address, Lamports, Network, Signature},
    error::ErrorReport,
    protocol::SignatureInfo,
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::{
    config::{Settings, DEFAULT_SNAP_ID},
    negotiator::{negotiate, select_option, ConnectError, NativeHandshake, WalletChooser},
    price::{CoinGeckoPriceFeed, PriceFeed, PriceQuote, PriceTicker},
    provider::{discover_providers, ConnectControls, HostEnvironment, WalletHandle, WalletOption},
    session::{SessionSnapshot, SessionState},
    signer::SigningCapability,
    transfer::{validate_transfer_input, TransferError, TransferExecutor, TransferOutcome},
};

#[derive(Debug, Clone)]
pub enum ClientEvent {
    ProvidersDiscovered {
        names: Vec<String>,
        controls: ConnectControls,
    },
    SessionChanged(SessionSnapshot),
    BalanceUpdated {
        account: Address,
        balance: Lamports,
    },
    PriceUpdated(PriceQuote),
    TransferConfirmed {
        signature: Signature,
        explorer_url: String,
    },
    TransferFailed(ErrorReport),
    Error(ErrorReport),
}

/// One entry of the connected account's recent activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub signature: Signature,
    pub slot: u64,
    pub block_time: Option<DateTime<Utc>>,
    pub succeeded: bool,
    pub memo: Option<String>,
}

impl From<SignatureInfo> for TransactionSummary {
    fn from(info: SignatureInfo) -> Self {
        Self {
            signature: info.signature,
            slot: info.slot,
            block_time: info
                .block_time
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
            succeeded: info.err.is_none(),
            memo: info.memo,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub network: Network,
    pub snap_id: String,
    pub confirm: ConfirmOptions,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            network: Network::default(),
            snap_id: DEFAULT_SNAP_ID.to_string(),
            confirm: ConfirmOptions::default(),
        }
    }
}

impl From<&Settings> for ControllerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            network: settings.network,
            snap_id: settings.snap_id.clone(),
            confirm: settings.confirm_options(),
        }
    }
}

/// Set while an operation runs; cleared on drop whatever the outcome.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct WalletController {
    host: Arc<dyn HostEnvironment>,
    ledger: Arc<dyn LedgerClient>,
    price: PriceTicker,
    executor: TransferExecutor,
    options: ControllerOptions,
    session: Mutex<SessionState>,
    balance: RwLock<Option<Lamports>>,
    connect_in_flight: AtomicBool,
    transfer_in_flight: AtomicBool,
    events: broadcast::Sender<ClientEvent>,
}

impl WalletController {
    /// Controller talking to the configured ledger endpoint and price API.
    pub fn new(settings: &Settings, host: Arc<dyn HostEnvironment>) -> Arc<Self> {
        Self::new_with_dependencies(
            host,
            Arc::new(RpcLedgerClient::new(settings.rpc_endpoint())),
            Arc::new(CoinGeckoPriceFeed::new(settings.price_api_url.clone())),
            ControllerOptions::from(settings),
        )
    }

    pub fn new_with_dependencies(
        host: Arc<dyn HostEnvironment>,
        ledger: Arc<dyn LedgerClient>,
        price_feed: Arc<dyn PriceFeed>,
        options: ControllerOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            host,
            executor: TransferExecutor::new(ledger.clone(), options.confirm),
            ledger,
            price: PriceTicker::new(price_feed),
            options,
            session: Mutex::new(SessionState::default()),
            balance: RwLock::new(None),
            connect_in_flight: AtomicBool::new(false),
            transfer_in_flight: AtomicBool::new(false),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ClientEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn network(&self) -> Network {
        self.options.network
    }

    pub fn is_connect_in_flight(&self) -> bool {
        self.connect_in_flight.load(Ordering::Acquire)
    }

    pub fn is_transfer_in_flight(&self) -> bool {
        self.transfer_in_flight.load(Ordering::Acquire)
    }

    /// Fresh discovery scan of the host environment.
    pub fn discover(&self) -> Vec<WalletOption> {
        let options = discover_providers(self.host.as_ref());
        let controls = ConnectControls::from_options(&options);
        debug!(count = options.len(), "wallet providers discovered");
        self.emit(ClientEvent::ProvidersDiscovered {
            names: options
                .iter()
                .map(|option| option.display_name.clone())
                .collect(),
            controls,
        });
        options
    }

    /// Discover, select (asking `chooser` when several options exist) and connect.
    pub async fn connect(
        &self,
        chooser: &dyn WalletChooser,
    ) -> Result<SessionSnapshot, ConnectError> {
        let Some(_guard) = InFlightGuard::acquire(&self.connect_in_flight) else {
            return Err(ConnectError::InFlight);
        };
        let options = self.discover();
        let selected = match select_option(&options, chooser).await {
            Ok(option) => option,
            Err(err) => {
                if !matches!(err, ConnectError::SelectionCancelled) {
                    self.emit(ClientEvent::Error(ErrorReport::new(
                        err.kind(),
                        err.user_message(),
                    )));
                }
                return Err(err);
            }
        };
        self.establish(&selected).await
    }

    /// Connect a specific option, skipping selection.
    pub async fn connect_option(
        &self,
        option: &WalletOption,
    ) -> Result<SessionSnapshot, ConnectError> {
        let Some(_guard) = InFlightGuard::acquire(&self.connect_in_flight) else {
            return Err(ConnectError::InFlight);
        };
        self.establish(option).await
    }

    async fn establish(&self, option: &WalletOption) -> Result<SessionSnapshot, ConnectError> {
        info!(wallet = %option.display_name, kind = ?option.kind(), "connecting wallet");
        match negotiate(option, &self.options.snap_id).await {
            Ok(capability) => Ok(self.install_session(&option.display_name, capability).await),
            Err(err) => {
                let err = ConnectError::from(err);
                error!(wallet = %option.display_name, "wallet connection failed: {err}");
                self.reset_session().await;
                self.emit(ClientEvent::Error(ErrorReport::new(
                    err.kind(),
                    err.user_message(),
                )));
                Err(err)
            }
        }
    }

    async fn install_session(
        &self,
        wallet_name: &str,
        capability: SigningCapability,
    ) -> SessionSnapshot {
        let (previous, snapshot) = {
            let mut session = self.session.lock().await;
            let previous = session.clear();
            session.set_connected(wallet_name, capability);
            (previous, session.snapshot())
        };
        if let Some(previous) = previous {
            info!(wallet = %previous.wallet_name, "replacing connected wallet");
            if let SigningCapability::Native(signer) = &previous.capability {
                if let Err(err) = signer.disconnect().await {
                    warn!(wallet = %previous.wallet_name, "wallet disconnect failed: {err}");
                }
            }
        }
        *self.balance.write().await = None;
        self.emit(ClientEvent::SessionChanged(snapshot.clone()));
        if let Err(err) = self.refresh_balance().await {
            warn!("initial balance refresh failed: {err}");
        }
        snapshot
    }

    async fn reset_session(&self) {
        let had_session = self.session.lock().await.clear().is_some();
        *self.balance.write().await = None;
        if had_session {
            self.emit(ClientEvent::SessionChanged(SessionSnapshot::default()));
        }
    }

    /// Silent reconnect to a native wallet that already trusts this client. Never prompts,
    /// never touches the bridge, never reports failures beyond a debug log.
    pub async fn auto_reconnect(&self) -> Option<SessionSnapshot> {
        let _guard = InFlightGuard::acquire(&self.connect_in_flight)?;
        for option in self.discover() {
            let WalletHandle::Native(wallet) = &option.handle else {
                continue;
            };
            match NativeHandshake::new(wallet.clone()).run(true).await {
                Ok(capability) => {
                    return Some(self.install_session(&option.display_name, capability).await)
                }
                Err(err) => {
                    debug!(wallet = %option.display_name, "silent reconnect skipped: {err}")
                }
            }
        }
        None
    }

    /// Returns `false` when there was nothing to disconnect.
    pub async fn disconnect(&self) -> bool {
        let Some(previous) = self.session.lock().await.clear() else {
            return false;
        };
        *self.balance.write().await = None;
        if let SigningCapability::Native(signer) = &previous.capability {
            if let Err(err) = signer.disconnect().await {
                warn!(wallet = %previous.wallet_name, "wallet disconnect failed: {err}");
            }
        }
        info!(wallet = %previous.wallet_name, "wallet disconnected");
        self.emit(ClientEvent::SessionChanged(SessionSnapshot::default()));
        true
    }

    pub async fn session(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    /// Exact account identifier of the connected wallet.
    pub async fn account(&self) -> Option<Address> {
        self.session.lock().await.account()
    }

    pub async fn balance(&self) -> Option<Lamports> {
        *self.balance.read().await
    }

    /// Re-reads the connected account's balance. `None` when disconnected.
    pub async fn refresh_balance(&self) -> Result<Option<Lamports>, RpcError> {
        let Some(account) = self.account().await else {
            return Ok(None);
        };
        let balance = self.ledger.get_balance(&account).await?;
        *self.balance.write().await = Some(balance);
        debug!(%account, lamports = balance.0, "balance refreshed");
        self.emit(ClientEvent::BalanceUpdated { account, balance });
        Ok(Some(balance))
    }

    pub async fn price(&self) -> Option<PriceQuote> {
        self.price.latest().await
    }

    pub async fn refresh_price(&self) -> Result<PriceQuote> {
        let quote = self.price.refresh().await?;
        self.emit(ClientEvent::PriceUpdated(quote));
        Ok(quote)
    }

    /// Validates form input, then builds, signs, submits and confirms a transfer.
    /// A confirmed transfer is followed by exactly one balance refresh.
    pub async fn submit_transfer(&self, recipient: &str, amount: &str) -> TransferOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.transfer_in_flight) else {
            return TransferOutcome::Failure(TransferError::InFlight);
        };
        let capability = self.session.lock().await.capability().cloned();
        let result = match validate_transfer_input(
            capability.as_ref().map(SigningCapability::account),
            recipient,
            amount,
        ) {
            Ok((_, recipient, lamports)) => match &capability {
                Some(capability) => self.sign_and_submit(capability, recipient, lamports).await,
                None => Err(TransferError::NotConnected),
            },
            Err(err) => Err(err),
        };

        match &result {
            Ok(signature) => {
                self.emit(ClientEvent::TransferConfirmed {
                    signature: *signature,
                    explorer_url: self.options.network.explorer_tx_url(signature),
                });
                if let Err(err) = self.refresh_balance().await {
                    warn!(%signature, "balance refresh after transfer failed: {err}");
                }
            }
            Err(err) => {
                if !err.kind().is_field_validation() {
                    warn!(kind = %err.kind(), "transfer failed: {err}");
                }
                self.emit(ClientEvent::TransferFailed(err.report()));
            }
        }
        result.into()
    }

    /// Signs against the captured capability and only submits if that account is still the
    /// connected one; a disconnect while the wallet was signing abandons the transfer.
    async fn sign_and_submit(
        &self,
        capability: &SigningCapability,
        recipient: Address,
        lamports: Lamports,
    ) -> Result<Signature, TransferError> {
        let signed = self.executor.prepare(capability, recipient, lamports).await?;
        if self.account().await != Some(signed.intent.payer) {
            warn!(payer = %signed.intent.payer, "session changed while signing, transfer dropped");
            return Err(TransferError::NotConnected);
        }
        self.executor.submit(signed).await
    }

    /// Most recent transactions touching the connected account; empty when disconnected.
    pub async fn recent_transactions(
        &self,
        limit: usize,
    ) -> Result<Vec<TransactionSummary>, RpcError> {
        let Some(account) = self.account().await else {
            return Ok(Vec::new());
        };
        let history = self.ledger.get_signatures_for_address(&account, limit).await?;
        Ok(history.into_iter().map(TransactionSummary::from).collect())
    }
}
