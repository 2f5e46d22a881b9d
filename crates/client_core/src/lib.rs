pub mod bridge_http;
pub mod config;
pub mod controller;
pub mod local_wallet;
pub mod negotiator;
pub mod price;
pub mod provider;
pub mod session;
pub mod signer;
pub mod transfer;

pub use bridge_http::HttpBridgeHost;
pub use config::{load_settings, Settings, SettingsError};
pub use controller::{ClientEvent, ControllerOptions, TransactionSummary, WalletController};
pub use local_wallet::LocalKeypairWallet;
pub use negotiator::{ConnectError, HandshakeError, NamedChooser, WalletChooser};
pub use price::{spawn_price_refresh, CoinGeckoPriceFeed, PriceFeed, PriceQuote};
pub use provider::{
    discover_providers, ConnectControls, HostEnvironment, StaticHostEnvironment, WalletOption,
    NO_COMPATIBLE_WALLET_MESSAGE,
};
pub use session::SessionSnapshot;
pub use signer::{NativeWallet, SigningCapability, WalletError};
pub use transfer::{TransferError, TransferOutcome};

#[cfg(test)]
#[path = "tests/fakes.rs"]
mod fakes;

#[cfg(test)]
#[path = "tests/provider_tests.rs"]
mod provider_tests;

#[cfg(test)]
#[path = "tests/negotiator_tests.rs"]
mod negotiator_tests;

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod controller_tests;

#[cfg(test)]
#[path = "tests/price_tests.rs"]
mod price_tests;

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod config_tests;

#[cfg(test)]
#[path = "tests/wallet_tests.rs"]
mod wallet_tests;
