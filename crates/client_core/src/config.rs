use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use ledger_rpc::ConfirmOptions;
use serde::{Deserialize, Serialize};
use shared::domain::{Commitment, Network};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::price::DEFAULT_PRICE_API_URL;

pub const SETTINGS_FILE: &str = "wallet.toml";
pub const DEFAULT_SNAP_ID: &str = "npm:@solflare-wallet/solana-snap";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub network: Network,
    /// Overrides the public endpoint of `network`.
    pub rpc_url: Option<String>,
    pub price_api_url: String,
    pub price_refresh_seconds: u64,
    pub confirm_commitment: Commitment,
    pub confirm_timeout_seconds: u64,
    pub keypair_path: Option<PathBuf>,
    pub keypair_trusted: bool,
    pub bridge_url: Option<String>,
    pub snap_id: String,
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: Network::MainnetBeta,
            rpc_url: None,
            price_api_url: DEFAULT_PRICE_API_URL.into(),
            price_refresh_seconds: 60,
            confirm_commitment: Commitment::Finalized,
            confirm_timeout_seconds: 90,
            keypair_path: None,
            keypair_trusted: false,
            bridge_url: None,
            snap_id: DEFAULT_SNAP_ID.into(),
            history_limit: 10,
        }
    }
}

impl Settings {
    pub fn rpc_endpoint(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| self.network.rpc_url().to_string())
    }

    pub fn price_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.price_refresh_seconds.max(1))
    }

    pub fn confirm_options(&self) -> ConfirmOptions {
        ConfirmOptions {
            commitment: self.confirm_commitment,
            timeout: Duration::from_secs(self.confirm_timeout_seconds),
            ..ConfirmOptions::default()
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(rpc_url) = &self.rpc_url {
            validate_http_url("rpc_url", rpc_url)?;
        }
        validate_http_url("price_api_url", &self.price_api_url)?;
        if let Some(bridge_url) = &self.bridge_url {
            validate_http_url("bridge_url", bridge_url)?;
        }
        if self.snap_id.trim().is_empty() {
            return Err(SettingsError::InvalidValue {
                key: "snap_id",
                reason: "must not be empty".into(),
            });
        }
        if self.confirm_timeout_seconds == 0 {
            return Err(SettingsError::InvalidValue {
                key: "confirm_timeout_seconds",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

fn validate_http_url(key: &'static str, raw: &str) -> Result<(), SettingsError> {
    let parsed = Url::parse(raw).map_err(|err| SettingsError::InvalidValue {
        key,
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SettingsError::InvalidValue {
            key,
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(())
}

/// Defaults, then `wallet.toml` in the working directory, then the environment.
pub fn load_settings() -> Result<Settings, SettingsError> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, SettingsError> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => toml::from_str::<Settings>(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            Settings::default()
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    apply_env_overrides(&mut settings, env)?;
    settings.validate()?;
    Ok(settings)
}

/// `APP__*` names win over the legacy Solana tool names.
fn env_value(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    legacy: Option<&str>,
) -> Option<String> {
    env(key).or_else(|| legacy.and_then(env))
}

fn parse_env<T: std::str::FromStr>(key: &'static str, raw: String) -> Result<T, SettingsError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err: T::Err| SettingsError::InvalidValue {
            key,
            reason: err.to_string(),
        })
}

fn apply_env_overrides(
    settings: &mut Settings,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(), SettingsError> {
    if let Some(v) = env_value(&env, "APP__NETWORK", Some("SOLANA_NETWORK")) {
        settings.network = parse_env("APP__NETWORK", v)?;
    }
    if let Some(v) = env_value(&env, "APP__RPC_URL", Some("SOLANA_RPC_URL")) {
        settings.rpc_url = Some(v);
    }
    if let Some(v) = env_value(&env, "APP__PRICE_API_URL", None) {
        settings.price_api_url = v;
    }
    if let Some(v) = env_value(&env, "APP__PRICE_REFRESH_SECONDS", None) {
        settings.price_refresh_seconds = parse_env("APP__PRICE_REFRESH_SECONDS", v)?;
    }
    if let Some(v) = env_value(&env, "APP__CONFIRM_COMMITMENT", None) {
        settings.confirm_commitment = parse_env("APP__CONFIRM_COMMITMENT", v)?;
    }
    if let Some(v) = env_value(&env, "APP__CONFIRM_TIMEOUT_SECONDS", None) {
        settings.confirm_timeout_seconds = parse_env("APP__CONFIRM_TIMEOUT_SECONDS", v)?;
    }
    if let Some(v) = env_value(&env, "APP__KEYPAIR_PATH", Some("SOLANA_KEYPAIR")) {
        settings.keypair_path = Some(PathBuf::from(v));
    }
    if let Some(v) = env_value(&env, "APP__KEYPAIR_TRUSTED", None) {
        settings.keypair_trusted = parse_env("APP__KEYPAIR_TRUSTED", v)?;
    }
    if let Some(v) = env_value(&env, "APP__BRIDGE_URL", None) {
        settings.bridge_url = Some(v);
    }
    if let Some(v) = env_value(&env, "APP__SNAP_ID", None) {
        settings.snap_id = v;
    }
    if let Some(v) = env_value(&env, "APP__HISTORY_LIMIT", None) {
        settings.history_limit = parse_env("APP__HISTORY_LIMIT", v)?;
    }
    Ok(())
}
