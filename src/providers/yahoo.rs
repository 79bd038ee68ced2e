//! Yahoo Finance chart API adapter
//!
//! `GET {base}/v8/finance/chart/{symbol}?range=1d&interval=5m`

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::providers::{Candle, PriceProvider, ProviderError};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Yahoo chart endpoint implementation
pub struct YahooChartProvider {
    client: Client,
    base_url: Url,
}

impl YahooChartProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::Config(format!("Invalid provider URL: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, base_url })
    }

    fn chart_url(&self, symbol: &str) -> std::result::Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Decode("provider URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }
}

#[async_trait]
impl PriceProvider for YahooChartProvider {
    fn id(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> std::result::Result<Vec<Candle>, ProviderError> {
        let url = self.chart_url(symbol)?;

        let response = self
            .client
            .get(url)
            .query(&[("range", range), ("interval", interval)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match status {
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound(symbol.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            s if !s.is_success() => Err(ProviderError::Status {
                status: s.as_u16(),
                message: body.chars().take(200).collect(),
            }),
            _ => parse_chart(symbol, &body),
        }
    }
}

// ============================================================================
// Response payload
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Convert a chart payload into candles, dropping bars without a close
fn parse_chart(symbol: &str, body: &str) -> std::result::Result<Vec<Candle>, ProviderError> {
    let envelope: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| ProviderError::Decode(e.to_string()))?;

    if let Some(error) = envelope.chart.error {
        if error.code.eq_ignore_ascii_case("not found") {
            return Err(ProviderError::NotFound(symbol.to_string()));
        }
        return Err(ProviderError::Decode(format!(
            "{}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let value = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();

    let candles = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let close = value(&quote.close, i).filter(|c| c.is_finite())?;
            let timestamp = Utc.timestamp_opt(*ts, 0).single()?;
            Some(Candle {
                timestamp,
                open: value(&quote.open, i).unwrap_or(close),
                high: value(&quote.high, i).unwrap_or(close),
                low: value(&quote.low, i).unwrap_or(close),
                close,
                volume: value(&quote.volume, i).unwrap_or(0.0) as i64,
            })
        })
        .collect();

    Ok(candles)
}
