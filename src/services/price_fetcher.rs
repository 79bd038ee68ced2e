//! Price Fetcher
//!
//! Retrieves the latest usable price for one normalized symbol. The most
//! recent candle may still be forming, so the second-to-last close is used
//! whenever two or more candles are available.

use crate::config::{ProviderConfig, RefreshConfig};
use crate::providers::{Candle, PriceProvider, ProviderError};
use crate::services::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Classification of one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Ok,
    NoData,
    Error,
}

/// Result of one fetch; `price` is 0 unless the outcome is `Ok`
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub price: f64,
    pub outcome: FetchOutcome,
    pub attempts: u32,
    pub error: Option<String>,
}

impl PriceQuote {
    fn ok(price: f64, attempts: u32) -> Self {
        Self {
            price,
            outcome: FetchOutcome::Ok,
            attempts,
            error: None,
        }
    }

    fn no_data(attempts: u32) -> Self {
        Self {
            price: 0.0,
            outcome: FetchOutcome::NoData,
            attempts,
            error: None,
        }
    }

    fn error(err: &ProviderError, attempts: u32) -> Self {
        Self {
            price: 0.0,
            outcome: FetchOutcome::Error,
            attempts,
            error: Some(err.to_string()),
        }
    }
}

/// Price selection rule over time-ordered candles
pub fn select_price(candles: &[Candle]) -> Option<f64> {
    match candles.len() {
        0 => None,
        1 => Some(candles[0].close),
        n => Some(candles[n - 2].close),
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub struct PriceFetcher {
    provider: Arc<dyn PriceProvider>,
    retry: RetryPolicy,
    range: String,
    interval: String,
    decimals: u32,
}

impl PriceFetcher {
    pub fn new(provider: Arc<dyn PriceProvider>, retry: RetryPolicy, range: impl Into<String>, interval: impl Into<String>, decimals: u32) -> Self {
        Self {
            provider,
            retry,
            range: range.into(),
            interval: interval.into(),
            decimals,
        }
    }

    pub fn from_config(provider: Arc<dyn PriceProvider>, retry: RetryPolicy, provider_config: &ProviderConfig, refresh: &RefreshConfig) -> Self {
        Self::new(
            provider,
            retry,
            provider_config.range.clone(),
            provider_config.interval.clone(),
            refresh.price_decimals,
        )
    }

    /// Fetch the latest usable price for `symbol`
    pub async fn fetch(&self, symbol: &str) -> PriceQuote {
        let mut attempts = 0;
        let result = self
            .retry
            .run(
                |attempt| {
                    attempts = attempt;
                    self.provider.fetch_candles(symbol, &self.range, &self.interval)
                },
                ProviderError::is_transient,
            )
            .await;

        match result {
            Ok(candles) => match select_price(&candles) {
                Some(price) => {
                    let price = round_to(price, self.decimals);
                    debug!("{}: {} candles, price {}", symbol, candles.len(), price);
                    PriceQuote::ok(price, attempts)
                }
                None => {
                    debug!("{}: no candles returned", symbol);
                    PriceQuote::no_data(attempts)
                }
            },
            Err((err, attempts)) => {
                warn!("Failed to fetch {} after {} attempt(s): {}", symbol, attempts, err);
                PriceQuote::error(&err, attempts)
            }
        }
    }
}
