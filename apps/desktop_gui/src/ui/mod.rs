//! UI layer for desktop GUI: app shell, persisted preferences, and form state.

pub mod app;

pub use app::{PersistedWalletSettings, WalletGuiApp, SETTINGS_STORAGE_KEY};
