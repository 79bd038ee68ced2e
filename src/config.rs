//! Application configuration
//!
//! Every knob has a default so an empty (or missing) config file yields a
//! working NSE setup: 25-stock batches, 3 workers, 09:15-15:30 IST Mon-Fri,
//! a trigger every 15 minutes and a CSV hit log.

use crate::error::{AppError, Result};
use chrono::{NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub refresh: RefreshConfig,
    pub retry: RetryConfig,
    pub provider: ProviderConfig,
    pub market: MarketConfig,
    pub scheduler: SchedulerConfig,
    pub symbols: SymbolConfig,
    pub source: SourceConfig,
    pub ledger: LedgerConfig,
}

/// HTTP control surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Batch execution knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub batch_size: usize,
    pub max_workers: usize,
    pub task_timeout_secs: u64,
    pub batch_timeout_secs: u64,
    pub batch_delay_secs: u64,
    pub price_decimals: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            max_workers: 3,
            task_timeout_secs: 20,
            batch_timeout_secs: 60,
            batch_delay_secs: 2,
            price_decimals: 2,
        }
    }
}

impl RefreshConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }
}

/// Retry policy for price fetches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Price data provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Candle window requested per fetch (must cover at least 2 candles)
    pub range: String,
    pub interval: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            range: "1d".to_string(),
            interval: "5m".to_string(),
            request_timeout_secs: 10,
            user_agent: "Mozilla/5.0 (compatible; target-watch/1.0)".to_string(),
        }
    }
}

/// Trading session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub timezone: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub weekdays: Vec<Weekday>,
    pub holidays: Vec<NaiveDate>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Kolkata,
            open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
            weekdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            holidays: Vec::new(),
        }
    }
}

/// Periodic trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub cadence_minutes: u32,
    /// Seconds past each cadence slot at which the trigger fires
    pub offset_secs: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cadence_minutes: 15,
            offset_secs: 15,
        }
    }
}

/// Symbol normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolConfig {
    pub default_suffix: String,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            default_suffix: ".NS".to_string(),
        }
    }
}

/// Where watchlists come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    GoogleSheet,
    CsvDir,
}

/// One sheet tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetTab {
    pub name: String,
    #[serde(default)]
    pub gid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub sheet_id: String,
    pub sheet_base_url: String,
    pub tabs: Vec<SheetTab>,
    pub csv_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::GoogleSheet,
            sheet_id: String::new(),
            sheet_base_url: "https://docs.google.com".to_string(),
            tabs: vec![SheetTab {
                name: "Intraday".to_string(),
                gid: Some("0".to_string()),
            }],
            csv_dir: PathBuf::from("watchlists"),
            request_timeout_secs: 15,
        }
    }
}

/// Hit-log sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Csv,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub kind: LedgerKind,
    pub path: PathBuf,
    /// Re-arm the sticky flag when the price drops back below target
    pub rearm_on_drop: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            kind: LedgerKind::Csv,
            path: PathBuf::from("logs/target_hits.csv"),
            rearm_on_drop: true,
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the optional TOML file, then env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| AppError::Config(format!("Invalid config file: {}", e)))
    }

    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("TARGET_WATCH_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TARGET_WATCH_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid TARGET_WATCH_PORT: {}", port),
            }
        }
        if let Ok(sheet_id) = std::env::var("TARGET_WATCH_SHEET_ID") {
            self.source.sheet_id = sheet_id;
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let refresh = &self.refresh;
        if refresh.batch_size == 0 {
            return Err(AppError::Config("refresh.batch_size must be at least 1".to_string()));
        }
        if refresh.max_workers == 0 {
            return Err(AppError::Config("refresh.max_workers must be at least 1".to_string()));
        }
        if refresh.task_timeout_secs == 0 || refresh.batch_timeout_secs == 0 {
            return Err(AppError::Config("refresh timeouts must be non-zero".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.retry.multiplier < 1.0 {
            return Err(AppError::Config("retry.multiplier must be >= 1.0".to_string()));
        }
        if self.market.open >= self.market.close {
            return Err(AppError::Config(format!(
                "market.open ({}) must be before market.close ({})",
                self.market.open, self.market.close
            )));
        }
        if self.market.weekdays.is_empty() {
            return Err(AppError::Config("market.weekdays must not be empty".to_string()));
        }
        if self.scheduler.cadence_minutes == 0 || self.scheduler.cadence_minutes > 24 * 60 {
            return Err(AppError::Config(
                "scheduler.cadence_minutes must be between 1 and 1440".to_string(),
            ));
        }
        if self.scheduler.offset_secs >= self.scheduler.cadence_minutes * 60 {
            return Err(AppError::Config(
                "scheduler.offset_secs must be shorter than the cadence".to_string(),
            ));
        }
        Url::parse(&self.provider.base_url)
            .map_err(|e| AppError::Config(format!("Invalid provider.base_url: {}", e)))?;
        if self.source.kind == SourceKind::GoogleSheet {
            Url::parse(&self.source.sheet_base_url)
                .map_err(|e| AppError::Config(format!("Invalid source.sheet_base_url: {}", e)))?;
            if self.source.tabs.is_empty() {
                return Err(AppError::Config("source.tabs must list at least one tab".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.refresh.batch_size, 25);
        assert_eq!(config.refresh.max_workers, 3);
        assert_eq!(config.market.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(config.market.open, NaiveTime::from_hms_opt(9, 15, 0).unwrap());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [refresh]
            batch_size = 10

            [market]
            close = "15:00:00"
            holidays = ["2026-01-26"]

            [source]
            kind = "csv_dir"
            csv_dir = "/tmp/lists"

            [[source.tabs]]
            name = "FIBOST"
            gid = "1298523822"
            "#,
        )
        .unwrap();

        assert_eq!(config.refresh.batch_size, 10);
        assert_eq!(config.refresh.max_workers, 3);
        assert_eq!(config.market.close, NaiveTime::from_hms_opt(15, 0, 0).unwrap());
        assert_eq!(config.market.holidays, vec![NaiveDate::from_ymd_opt(2026, 1, 26).unwrap()]);
        assert_eq!(config.source.kind, SourceKind::CsvDir);
        assert_eq!(config.source.tabs[0].gid.as_deref(), Some("1298523822"));
        assert_eq!(config.ledger.kind, LedgerKind::Csv);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.refresh.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.market.open = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.provider.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scheduler.offset_secs = 15 * 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [market]
            timezone = "Mars/Olympus"
            "#,
        );
        assert!(result.is_err());
    }
}
