//! Fiat price feed for the ledger's native asset and the conversion helpers built on it.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::protocol::SimplePriceResponse;
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tracing::{debug, warn};

use crate::controller::WalletController;

pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3";
const PRICE_ASSET_ID: &str = "solana";
const PRICE_CURRENCY: &str = "usd";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub usd_per_sol: f64,
    pub fetched_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(usd_per_sol: f64) -> Self {
        Self {
            usd_per_sol,
            fetched_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_usd_price(&self) -> Result<PriceQuote>;
}

pub struct MissingPriceFeed;

#[async_trait]
impl PriceFeed for MissingPriceFeed {
    async fn fetch_usd_price(&self) -> Result<PriceQuote> {
        Err(anyhow!("price feed is unavailable"))
    }
}

/// CoinGecko-compatible `/simple/price` endpoint.
pub struct CoinGeckoPriceFeed {
    http: Client,
    base_url: String,
}

impl CoinGeckoPriceFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoPriceFeed {
    async fn fetch_usd_price(&self) -> Result<PriceQuote> {
        let body: SimplePriceResponse = self
            .http
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", PRICE_ASSET_ID), ("vs_currencies", PRICE_CURRENCY)])
            .send()
            .await
            .context("price request failed")?
            .error_for_status()
            .context("price endpoint returned an error status")?
            .json()
            .await
            .context("price response is not valid json")?;
        let usd_per_sol = body
            .get(PRICE_ASSET_ID)
            .and_then(|prices| prices.get(PRICE_CURRENCY))
            .copied()
            .ok_or_else(|| {
                anyhow!("price response has no {PRICE_ASSET_ID}/{PRICE_CURRENCY} entry")
            })?;
        if !usd_per_sol.is_finite() || usd_per_sol <= 0.0 {
            return Err(anyhow!("price feed returned a non-positive price {usd_per_sol}"));
        }
        Ok(PriceQuote::new(usd_per_sol))
    }
}

/// Keeps the last good quote; a failed refresh leaves it in place.
pub struct PriceTicker {
    feed: Arc<dyn PriceFeed>,
    last: RwLock<Option<PriceQuote>>,
}

impl PriceTicker {
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self {
            feed,
            last: RwLock::new(None),
        }
    }

    pub async fn latest(&self) -> Option<PriceQuote> {
        *self.last.read().await
    }

    pub async fn refresh(&self) -> Result<PriceQuote> {
        match self.feed.fetch_usd_price().await {
            Ok(quote) => {
                debug!(usd_per_sol = quote.usd_per_sol, "price refreshed");
                *self.last.write().await = Some(quote);
                Ok(quote)
            }
            Err(err) => {
                warn!("price refresh failed, keeping last quote: {err:#}");
                Err(err)
            }
        }
    }
}

/// Background price refresh; aborted when dropped.
pub struct PriceRefreshTask {
    handle: JoinHandle<()>,
}

impl Drop for PriceRefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Refreshes the controller's price now and then on every `every` tick.
pub fn spawn_price_refresh(controller: Arc<WalletController>, every: Duration) -> PriceRefreshTask {
    let mut ticks = IntervalStream::new(tokio::time::interval(every));
    let handle = tokio::spawn(async move {
        while ticks.next().await.is_some() {
            // failures are logged by the ticker and the last quote stays on screen
            let _ = controller.refresh_price().await;
        }
    });
    PriceRefreshTask { handle }
}

pub mod convert {
    use shared::domain::Lamports;

    use super::PriceQuote;

    pub const PRICE_LOADING_LABEL: &str = "Loading price...";

    /// `None` without a usable price.
    pub fn fiat_to_sol(fiat: f64, quote: Option<&PriceQuote>) -> Option<f64> {
        let price = quote?.usd_per_sol;
        (fiat.is_finite() && price > 0.0).then(|| fiat / price)
    }

    pub fn sol_to_fiat(sol: f64, quote: Option<&PriceQuote>) -> Option<f64> {
        let price = quote?.usd_per_sol;
        (sol.is_finite() && price > 0.0).then(|| sol * price)
    }

    pub fn format_sol_balance(balance: Lamports) -> String {
        balance.to_string()
    }

    pub fn format_fiat_balance(balance: Lamports, quote: Option<&PriceQuote>) -> String {
        match sol_to_fiat(balance.as_sol(), quote) {
            Some(fiat) => format!("~${fiat:.2} USD"),
            None => PRICE_LOADING_LABEL.to_string(),
        }
    }
}
