//! Discovery of the wallet capabilities a host environment injects.

use std::sync::Arc;

use anyhow::{Context, Result};
use shared::domain::WalletKind;
use tracing::info;

use crate::{
    bridge_http::HttpBridgeHost,
    config::Settings,
    local_wallet::LocalKeypairWallet,
    signer::{BridgeHost, NativeWallet},
};

pub const NO_COMPATIBLE_WALLET_MESSAGE: &str =
    "No compatible wallet found. Install a Solana wallet extension.";
pub const BRIDGED_OPTION_LABEL: &str = "MetaMask (Solana Snap)";

/// Whatever hosts the client and exposes wallet capabilities to it.
pub trait HostEnvironment: Send + Sync {
    fn native_wallets(&self) -> Vec<Arc<dyn NativeWallet>>;
    fn bridge_host(&self) -> Option<Arc<dyn BridgeHost>>;
}

/// Host with a fixed set of capabilities, assembled at startup.
#[derive(Default, Clone)]
pub struct StaticHostEnvironment {
    native: Vec<Arc<dyn NativeWallet>>,
    bridge: Option<Arc<dyn BridgeHost>>,
}

impl StaticHostEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native(mut self, wallet: Arc<dyn NativeWallet>) -> Self {
        self.native.push(wallet);
        self
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn BridgeHost>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Desktop host: the configured keypair file as a native wallet and the configured
    /// bridge endpoint as a MetaMask-compatible host. Both are optional.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut host = Self::new();
        if let Some(path) = &settings.keypair_path {
            let wallet = LocalKeypairWallet::from_json_file(path)
                .context("failed to load the configured keypair wallet")?
                .trusted(settings.keypair_trusted);
            info!(
                address = %wallet.address(),
                trusted = settings.keypair_trusted,
                "keypair wallet available"
            );
            host = host.with_native(Arc::new(wallet));
        }
        if let Some(url) = &settings.bridge_url {
            info!(endpoint = %url, "bridge host available");
            host = host.with_bridge(Arc::new(HttpBridgeHost::metamask(url.clone())));
        }
        Ok(host)
    }
}

impl HostEnvironment for StaticHostEnvironment {
    fn native_wallets(&self) -> Vec<Arc<dyn NativeWallet>> {
        self.native.clone()
    }

    fn bridge_host(&self) -> Option<Arc<dyn BridgeHost>> {
        self.bridge.clone()
    }
}

#[derive(Clone)]
pub enum WalletHandle {
    Native(Arc<dyn NativeWallet>),
    Bridged(Arc<dyn BridgeHost>),
}

#[derive(Clone)]
pub struct WalletOption {
    pub display_name: String,
    pub handle: WalletHandle,
}

impl WalletOption {
    pub fn kind(&self) -> WalletKind {
        match self.handle {
            WalletHandle::Native(_) => WalletKind::NativeSigner,
            WalletHandle::Bridged(_) => WalletKind::BridgedSigner,
        }
    }
}

impl std::fmt::Debug for WalletOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletOption")
            .field("display_name", &self.display_name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Ranked connectable options: native wallets first, the bridge last.
pub fn discover_providers(env: &dyn HostEnvironment) -> Vec<WalletOption> {
    let mut options: Vec<WalletOption> = env
        .native_wallets()
        .into_iter()
        .map(|wallet| WalletOption {
            display_name: wallet.brand().label().to_string(),
            handle: WalletHandle::Native(wallet),
        })
        .collect();

    if let Some(bridge) = env.bridge_host() {
        if bridge.is_recognized_bridge() {
            options.push(WalletOption {
                display_name: BRIDGED_OPTION_LABEL.to_string(),
                handle: WalletHandle::Bridged(bridge),
            });
        }
    }
    options
}

/// Connect button state derived from a discovery scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectControls {
    pub enabled: bool,
    pub message: Option<&'static str>,
}

impl ConnectControls {
    pub fn from_options(options: &[WalletOption]) -> Self {
        if options.is_empty() {
            Self {
                enabled: false,
                message: Some(NO_COMPATIBLE_WALLET_MESSAGE),
            }
        } else {
            Self {
                enabled: true,
                message: None,
            }
        }
    }
}
