//! Application state management

use crate::config::{AppConfig, LedgerKind, SourceKind};
use crate::error::Result;
use crate::ledger::{CsvHitSink, HitLedger, HitSink, SqliteHitSink};
use crate::providers::{PriceProvider, YahooChartProvider};
use crate::scheduler::{Clock, MarketHoursGate, RefreshScheduler, SystemClock};
use crate::services::{BatchExecutor, BatchSettings, PriceFetcher, RefreshService, RetryPolicy};
use crate::sources::{CsvDirSource, GoogleSheetSource, WatchlistSource};
use crate::watchlist::WatchlistStore;
use std::sync::Arc;

/// Application state shared by the HTTP handlers and the scheduler
pub struct AppState {
    /// Refresh orchestrator (owns store and ledger)
    pub service: Arc<RefreshService>,

    /// Periodic trigger
    pub scheduler: Arc<RefreshScheduler>,
}

impl AppState {
    /// Wire every component from configuration
    pub fn new(config: AppConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let provider: Arc<dyn PriceProvider> = Arc::new(YahooChartProvider::new(&config.provider)?);

        let source: Arc<dyn WatchlistSource> = match config.source.kind {
            SourceKind::GoogleSheet => Arc::new(GoogleSheetSource::new(&config.source)?),
            SourceKind::CsvDir => Arc::new(CsvDirSource::new(config.source.csv_dir.clone())),
        };

        let sink: Arc<dyn HitSink> = match config.ledger.kind {
            LedgerKind::Csv => Arc::new(CsvHitSink::new(config.ledger.path.clone())),
            LedgerKind::Sqlite => Arc::new(SqliteHitSink::new(&config.ledger.path)?),
        };

        tracing::info!(
            "Using {} price provider, {} watchlist source, {} hit log at {:?}",
            provider.id(),
            source.kind(),
            sink.kind(),
            config.ledger.path
        );

        Ok(Self::from_parts(&config, provider, source, sink, clock))
    }

    /// Wire from already-built collaborators
    pub fn from_parts(
        config: &AppConfig,
        provider: Arc<dyn PriceProvider>,
        source: Arc<dyn WatchlistSource>,
        sink: Arc<dyn HitSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ledger = Arc::new(HitLedger::new(
            sink,
            clock.clone(),
            config.market.timezone,
            config.ledger.rearm_on_drop,
        ));

        let fetcher = Arc::new(PriceFetcher::from_config(
            provider,
            RetryPolicy::from_config(&config.retry),
            &config.provider,
            &config.refresh,
        ));

        let settings = BatchSettings::from_config(&config.refresh, &config.symbols.default_suffix);
        let executor = Arc::new(BatchExecutor::new(fetcher, ledger.clone(), settings));

        let service = Arc::new(RefreshService::new(
            Arc::new(WatchlistStore::new()),
            ledger,
            executor,
            source,
            clock.clone(),
            config.symbols.default_suffix.clone(),
        ));

        let scheduler = Arc::new(RefreshScheduler::new(
            service.clone(),
            MarketHoursGate::from_config(&config.market),
            clock,
            &config.scheduler,
        ));

        Self { service, scheduler }
    }
}
