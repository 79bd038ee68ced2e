//! Price data provider adapters
//!
//! A provider returns time-ordered candles for a symbol over a requested
//! window. Failures are classified so the retry policy can tell a symbol that
//! does not exist from a flaky network.

pub mod yahoo;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use yahoo::YahooChartProvider;

/// One aggregated price bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Candle {
    /// Candle with only a close price (open/high/low set to the close)
    pub fn from_close(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        }
    }
}

/// Errors that can occur within a `PriceProvider` implementation
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Symbol unknown or delisted; never retried
    #[error("Symbol not found: {0}")]
    NotFound(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether another attempt may succeed. Only an unknown symbol is
    /// permanent; throttled responses come back as 4xx or HTML bodies too.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::NotFound(_))
    }
}

/// Market data source trait that all providers implement
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Provider ID (e.g., "yahoo")
    fn id(&self) -> &'static str;

    /// Fetch candles for `symbol` covering `range` at `interval` granularity
    async fn fetch_candles(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> Result<Vec<Candle>, ProviderError>;
}
