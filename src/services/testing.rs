//! Fully wired refresh service over scripted collaborators

use crate::ledger::testing::MemorySink;
use crate::ledger::HitLedger;
use crate::providers::mock::ScriptedProvider;
use crate::scheduler::ManualClock;
use crate::services::{BatchExecutor, BatchSettings, PriceFetcher, RefreshService, RetryPolicy};
use crate::sources::testing::StaticSource;
use crate::watchlist::{WatchlistStore, DEFAULT_SUFFIX};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub service: Arc<RefreshService>,
    pub provider: Arc<ScriptedProvider>,
    pub source: Arc<StaticSource>,
    pub sink: Arc<MemorySink>,
    pub clock: Arc<ManualClock>,
}

/// Default envelope (B=25, W=3, 20s/60s deadlines, 2s pacing), single-attempt
/// retries, clock at Wednesday 2026-10-14 10:30 IST
pub fn harness() -> Harness {
    let provider = Arc::new(ScriptedProvider::new());
    let source = Arc::new(StaticSource::new());
    let sink = Arc::new(MemorySink::default());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 14, 5, 0, 0).unwrap()));

    let retry = RetryPolicy::new(1, Duration::ZERO, Duration::ZERO, 1.0, false);
    let fetcher = Arc::new(PriceFetcher::new(provider.clone(), retry, "1d", "5m", 2));
    let ledger = Arc::new(HitLedger::new(sink.clone(), clock.clone(), chrono_tz::Asia::Kolkata, true));
    let settings = BatchSettings {
        batch_size: 25,
        max_workers: 3,
        task_timeout: Duration::from_secs(20),
        batch_timeout: Duration::from_secs(60),
        batch_delay: Duration::from_secs(2),
        default_suffix: DEFAULT_SUFFIX.to_string(),
    };
    let executor = Arc::new(BatchExecutor::new(fetcher, ledger.clone(), settings));
    let service = Arc::new(RefreshService::new(
        Arc::new(WatchlistStore::new()),
        ledger,
        executor,
        source.clone(),
        clock.clone(),
        DEFAULT_SUFFIX,
    ));

    Harness {
        service,
        provider,
        source,
        sink,
        clock,
    }
}
