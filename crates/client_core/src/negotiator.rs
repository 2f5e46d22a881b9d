//! Handshakes that turn a discovered wallet option into a signing capability.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use shared::{
    domain::Address,
    error::{ErrorKind, HandshakeStep},
    protocol::SnapConnectResponse,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    provider::{WalletHandle, WalletOption, NO_COMPATIBLE_WALLET_MESSAGE},
    signer::{
        BridgeHost, BridgedSigner, ConnectOptions, NativeSigner, NativeWallet, SigningCapability,
        WalletError,
    },
};

#[derive(Debug, Error)]
#[error("{} failed: {source}", .step.describe())]
pub struct HandshakeError {
    pub step: HandshakeStep,
    #[source]
    pub source: WalletError,
}

impl HandshakeError {
    fn new(step: HandshakeStep, source: WalletError) -> Self {
        Self { step, source }
    }

    /// Message shown to the user for a failed step.
    pub fn user_message(&self) -> String {
        let lead = match self.step {
            HandshakeStep::NativeConnect => "Could not connect to the wallet",
            HandshakeStep::RequestHostAccounts => "MetaMask did not grant account access",
            HandshakeStep::RequestBridgeInstallation => "The Solana Snap could not be installed",
            HandshakeStep::InvokeBridgeConnect => "The Solana Snap did not connect an account",
        };
        format!("{lead}: {}", self.source)
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("{}", NO_COMPATIBLE_WALLET_MESSAGE)]
    ProviderNotFound,
    #[error("wallet selection was cancelled")]
    SelectionCancelled,
    #[error("a connection attempt is already in progress")]
    InFlight,
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

impl ConnectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectError::ProviderNotFound => ErrorKind::ProviderNotFound,
            ConnectError::SelectionCancelled => ErrorKind::SelectionCancelled,
            ConnectError::InFlight => ErrorKind::InFlight,
            ConnectError::Handshake(err) => ErrorKind::HandshakeStepFailed { step: err.step },
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ConnectError::Handshake(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeHandshakeState {
    Idle,
    Requesting,
    Connected,
    Failed,
}

pub struct NativeHandshake {
    wallet: Arc<dyn NativeWallet>,
    state: NativeHandshakeState,
}

impl NativeHandshake {
    pub fn new(wallet: Arc<dyn NativeWallet>) -> Self {
        Self {
            wallet,
            state: NativeHandshakeState::Idle,
        }
    }

    pub fn state(&self) -> NativeHandshakeState {
        self.state
    }

    /// `silent` only succeeds for wallets that already trust this client.
    pub async fn run(&mut self, silent: bool) -> Result<SigningCapability, HandshakeError> {
        self.state = NativeHandshakeState::Requesting;
        let result = self
            .wallet
            .connect(ConnectOptions {
                only_if_trusted: silent,
            })
            .await
            .and_then(|()| self.wallet.public_key().ok_or(WalletError::MissingAccount));

        match result {
            Ok(account) => {
                self.state = NativeHandshakeState::Connected;
                info!(%account, brand = self.wallet.brand().label(), "native wallet connected");
                Ok(SigningCapability::Native(NativeSigner::new(
                    self.wallet.clone(),
                    account,
                )))
            }
            Err(source) => {
                self.state = NativeHandshakeState::Failed;
                Err(HandshakeError::new(HandshakeStep::NativeConnect, source))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgedHandshakeState {
    Idle,
    RequestingHostAccounts,
    RequestingBridgeInstallation,
    InvokingBridgeConnect,
    Connected,
    Failed,
}

/// Three-step handshake: host accounts, snap installation, snap connect.
pub struct BridgedHandshake {
    host: Arc<dyn BridgeHost>,
    snap_id: String,
    state: BridgedHandshakeState,
    visited: Vec<BridgedHandshakeState>,
}

impl BridgedHandshake {
    pub fn new(host: Arc<dyn BridgeHost>, snap_id: impl Into<String>) -> Self {
        Self {
            host,
            snap_id: snap_id.into(),
            state: BridgedHandshakeState::Idle,
            visited: vec![BridgedHandshakeState::Idle],
        }
    }

    pub fn state(&self) -> BridgedHandshakeState {
        self.state
    }

    pub fn visited(&self) -> &[BridgedHandshakeState] {
        &self.visited
    }

    fn enter(&mut self, next: BridgedHandshakeState) {
        debug!(from = ?self.state, to = ?next, "bridged handshake transition");
        self.state = next;
        self.visited.push(next);
    }

    fn fail(&mut self, step: HandshakeStep, source: WalletError) -> HandshakeError {
        warn!(step = step.describe(), "bridged handshake failed: {source}");
        self.enter(BridgedHandshakeState::Failed);
        HandshakeError::new(step, source)
    }

    pub async fn run(&mut self) -> Result<SigningCapability, HandshakeError> {
        self.enter(BridgedHandshakeState::RequestingHostAccounts);
        if let Err(err) = self.host.request_accounts().await {
            return Err(self.fail(HandshakeStep::RequestHostAccounts, err));
        }

        self.enter(BridgedHandshakeState::RequestingBridgeInstallation);
        match self.host.request_snap(&self.snap_id).await {
            Ok(installed) if installed.get(&self.snap_id).is_some() => {}
            Ok(_) => {
                let err = WalletError::InvalidResponse(format!(
                    "snap {} is not enabled in the host",
                    self.snap_id
                ));
                return Err(self.fail(HandshakeStep::RequestBridgeInstallation, err));
            }
            Err(err) => return Err(self.fail(HandshakeStep::RequestBridgeInstallation, err)),
        }

        self.enter(BridgedHandshakeState::InvokingBridgeConnect);
        let account = match self.invoke_connect().await {
            Ok(account) => account,
            Err(err) => return Err(self.fail(HandshakeStep::InvokeBridgeConnect, err)),
        };

        self.enter(BridgedHandshakeState::Connected);
        info!(%account, snap_id = %self.snap_id, "bridged wallet connected");
        Ok(SigningCapability::Bridged(BridgedSigner::new(
            self.host.clone(),
            self.snap_id.clone(),
            account,
        )))
    }

    async fn invoke_connect(&self) -> Result<Address, WalletError> {
        let raw = self
            .host
            .invoke_snap(&self.snap_id, "connect", json!({}))
            .await?;
        let response: SnapConnectResponse = serde_json::from_value(raw)
            .map_err(|err| WalletError::InvalidResponse(err.to_string()))?;
        let public_key = response
            .public_key
            .filter(|key| !key.is_empty())
            .ok_or(WalletError::MissingAccount)?;
        public_key
            .parse()
            .map_err(|err| WalletError::InvalidResponse(format!("snap account: {err}")))
    }
}

/// Runs the handshake matching the option's kind.
pub async fn negotiate(
    option: &WalletOption,
    snap_id: &str,
) -> Result<SigningCapability, HandshakeError> {
    match &option.handle {
        WalletHandle::Native(wallet) => NativeHandshake::new(wallet.clone()).run(false).await,
        WalletHandle::Bridged(host) => BridgedHandshake::new(host.clone(), snap_id).run().await,
    }
}

/// Lets the user pick among several options. `None` cancels.
#[async_trait]
pub trait WalletChooser: Send + Sync {
    async fn choose(&self, options: &[WalletOption]) -> Option<usize>;
}

/// Picks the option with the given display name, if present.
pub struct NamedChooser(pub String);

#[async_trait]
impl WalletChooser for NamedChooser {
    async fn choose(&self, options: &[WalletOption]) -> Option<usize> {
        options
            .iter()
            .position(|option| option.display_name.eq_ignore_ascii_case(&self.0))
    }
}

/// Zero options fail, one is taken as-is, several go through the chooser.
pub async fn select_option(
    options: &[WalletOption],
    chooser: &dyn WalletChooser,
) -> Result<WalletOption, ConnectError> {
    match options {
        [] => Err(ConnectError::ProviderNotFound),
        [only] => Ok(only.clone()),
        many => {
            let choice = chooser.choose(many).await;
            match choice.and_then(|index| many.get(index)) {
                Some(option) => Ok(option.clone()),
                None => {
                    debug!(?choice, "wallet selection cancelled");
                    Err(ConnectError::SelectionCancelled)
                }
            }
        }
    }
}
