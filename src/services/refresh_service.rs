//! Refresh Service
//!
//! Top-level entry point of the pipeline. Selects the watchlist(s) to
//! refresh, runs each through the batch executor under its own lock, writes
//! completed batches back into the store and reports aggregate statistics.
//! Also owns the reload path that replaces the store from the source.

use crate::error::{AppError, Result};
use crate::ledger::HitLedger;
use crate::scheduler::Clock;
use crate::services::batch_executor::BatchExecutor;
use crate::sources::{rows_to_entries, WatchlistSource};
use crate::watchlist::{Status, StoreSnapshot, Watchlist, WatchlistEntry, WatchlistStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Reports
// ============================================================================

/// Outcome of one refresh call
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStats {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub processing_time_secs: f64,
    pub total_stocks: usize,
    pub target_hits: usize,
    pub below_target: usize,
    pub errors: usize,
    pub timeouts: usize,
    pub no_data: usize,
    pub new_hits_logged: usize,
    pub batch_size: usize,
    pub watchlists: Vec<WatchlistReport>,
}

/// Per-watchlist part of `RefreshStats`
#[derive(Debug, Clone, Serialize)]
pub struct WatchlistReport {
    pub name: String,
    pub total: usize,
    pub target_hits: usize,
    pub below_target: usize,
    pub errors: usize,
    pub timeouts: usize,
    pub no_data: usize,
    pub new_hits_logged: usize,
    pub batches: usize,
    /// False when a reload superseded this refresh and write-back was dropped
    pub applied: bool,
    pub entries: Vec<WatchlistEntry>,
}

impl WatchlistReport {
    fn new(name: &str, entries: Vec<WatchlistEntry>, new_hits_logged: usize, batches: usize, applied: bool) -> Self {
        let count = |status: Status| entries.iter().filter(|e| e.status == status).count();
        Self {
            name: name.to_string(),
            total: entries.len(),
            target_hits: count(Status::TargetHit),
            below_target: count(Status::BelowTarget),
            errors: count(Status::Error),
            timeouts: count(Status::Timeout),
            no_data: count(Status::NoData),
            new_hits_logged,
            batches,
            applied,
            entries,
        }
    }
}

/// Load result of one tab
#[derive(Debug, Clone, Serialize)]
pub struct TabLoad {
    pub name: String,
    pub loaded: usize,
    pub error: Option<String>,
    /// The tab failed and its previous entries were retained
    pub kept_previous: bool,
}

/// Outcome of one reload
#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    pub generation: u64,
    pub total_entries: usize,
    pub ledger_reset: bool,
    pub tabs: Vec<TabLoad>,
}

// ============================================================================
// Service
// ============================================================================

pub struct RefreshService {
    store: Arc<WatchlistStore>,
    ledger: Arc<HitLedger>,
    executor: Arc<BatchExecutor>,
    source: Arc<dyn WatchlistSource>,
    clock: Arc<dyn Clock>,
    default_suffix: String,
    /// One lock per watchlist name
    locks: DashMap<String, Arc<Mutex<()>>>,
    reload_lock: Mutex<()>,
    /// Refreshes hold this shared; a reload takes it exclusively to swap the
    /// store and clear the ledger together
    mutation: RwLock<()>,
}

impl RefreshService {
    pub fn new(
        store: Arc<WatchlistStore>,
        ledger: Arc<HitLedger>,
        executor: Arc<BatchExecutor>,
        source: Arc<dyn WatchlistSource>,
        clock: Arc<dyn Clock>,
        default_suffix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ledger,
            executor,
            source,
            clock,
            default_suffix: default_suffix.into(),
            locks: DashMap::new(),
            reload_lock: Mutex::new(()),
            mutation: RwLock::new(()),
        }
    }

    pub fn store(&self) -> &Arc<WatchlistStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<HitLedger> {
        &self.ledger
    }

    /// Refresh every watchlist in the store
    pub async fn refresh_all(&self) -> Result<RefreshStats> {
        self.refresh(None).await
    }

    /// Refresh a single watchlist by name
    pub async fn refresh_one(&self, name: &str) -> Result<RefreshStats> {
        self.refresh(Some(name)).await
    }

    /// Refresh one watchlist, or all of them when `name` is `None`
    pub async fn refresh(&self, name: Option<&str>) -> Result<RefreshStats> {
        self.ensure_loaded().await?;

        let names = match name {
            Some(name) => {
                if self.store.get(name).is_none() {
                    return Err(AppError::NotFound(format!("watchlist '{}'", name)));
                }
                vec![name.to_string()]
            }
            None => self.store.names(),
        };

        let run_id = Uuid::new_v4();
        let started_at = self.clock.now();
        let started = Instant::now();
        info!("[{}] Refresh started for {} watchlist(s)", run_id, names.len());

        let mut reports = Vec::with_capacity(names.len());
        for name in &names {
            if let Some(report) = self.refresh_watchlist(name, run_id).await {
                reports.push(report);
            }
        }

        let sum = |f: fn(&WatchlistReport) -> usize| reports.iter().map(f).sum::<usize>();
        let stats = RefreshStats {
            run_id,
            started_at,
            processing_time_secs: started.elapsed().as_secs_f64(),
            total_stocks: sum(|r| r.total),
            target_hits: sum(|r| r.target_hits),
            below_target: sum(|r| r.below_target),
            errors: sum(|r| r.errors),
            timeouts: sum(|r| r.timeouts),
            no_data: sum(|r| r.no_data),
            new_hits_logged: sum(|r| r.new_hits_logged),
            batch_size: self.executor.settings().batch_size,
            watchlists: reports,
        };

        info!(
            "[{}] Refresh completed in {:.2}s: {} stocks, {} target hits ({} new), {} errors, {} timeouts",
            run_id,
            stats.processing_time_secs,
            stats.total_stocks,
            stats.target_hits,
            stats.new_hits_logged,
            stats.errors,
            stats.timeouts
        );
        Ok(stats)
    }

    async fn refresh_watchlist(&self, name: &str, run_id: Uuid) -> Option<WatchlistReport> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        let _mutation = self.mutation.read().await;

        // Read under the lock so a queued refresh sees the previous one's results
        let Some((generation, watchlist)) = self.store.get(name) else {
            warn!("[{}] Watchlist '{}' removed before refresh, skipping", run_id, name);
            return None;
        };

        info!(
            "[{}] Refreshing '{}' ({} stocks)",
            run_id,
            name,
            watchlist.entries.len()
        );

        let mut applied = true;
        let summary = self
            .executor
            .run_with(watchlist.entries, name, |batch| {
                applied &= self.store.apply_batch(name, generation, &batch.entries);
            })
            .await;

        Some(WatchlistReport::new(
            name,
            summary.entries,
            summary.new_hits,
            summary.batches,
            applied,
        ))
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load the store from the source when it is empty
    pub async fn ensure_loaded(&self) -> Result<()> {
        if !self.store.is_empty() {
            return Ok(());
        }

        let _guard = self.reload_lock.lock().await;
        // Another caller may have loaded while we waited
        if !self.store.is_empty() {
            return Ok(());
        }

        info!("Watchlist store empty, loading from {} source", self.source.kind());
        let report = self
            .reload_locked(false)
            .await
            .map_err(|e| AppError::NothingToRefresh(e.to_string()))?;

        if self.store.is_empty() {
            let failures: Vec<String> = report
                .tabs
                .iter()
                .filter_map(|t| t.error.as_ref().map(|e| format!("{}: {}", t.name, e)))
                .collect();
            let message = if failures.is_empty() {
                "no watchlists available from source".to_string()
            } else {
                failures.join("; ")
            };
            return Err(AppError::NothingToRefresh(message));
        }

        Ok(())
    }

    /// Current store contents, loading first when empty
    pub async fn state(&self) -> StoreSnapshot {
        if let Err(e) = self.ensure_loaded().await {
            warn!("Serving empty watchlist state: {}", e);
        }
        self.store.snapshot()
    }

    /// Replace the store from the source, optionally clearing the ledger.
    ///
    /// A tab that fails keeps its previous entries (or is left out when it
    /// had none). Only an unreachable tab listing fails the whole reload.
    pub async fn reload(&self, reset_ledger: bool) -> Result<ReloadReport> {
        let _guard = self.reload_lock.lock().await;
        self.reload_locked(reset_ledger).await
    }

    /// Caller holds `reload_lock`
    async fn reload_locked(&self, reset_ledger: bool) -> Result<ReloadReport> {
        let tabs = self.source.tabs().await.map_err(|e| {
            error!("Failed to list watchlist tabs from {} source: {}", self.source.kind(), e);
            e
        })?;

        let mut fetched = Vec::with_capacity(tabs.len());
        for tab in tabs {
            let rows = self.source.fetch_tab(&tab).await;
            fetched.push((tab, rows));
        }

        // Waits for in-flight refreshes so none of them writes into the new
        // store or sets a ledger flag after the reset
        let _mutation = self.mutation.write().await;
        let previous = self.store.snapshot();

        let mut watchlists = Vec::with_capacity(fetched.len());
        let mut loads = Vec::with_capacity(fetched.len());

        for (tab, rows) in fetched {
            match rows {
                Ok(rows) => {
                    let entries = rows_to_entries(&tab, rows, &self.default_suffix);
                    info!("Loaded {} stocks from tab '{}'", entries.len(), tab);
                    loads.push(TabLoad {
                        name: tab.clone(),
                        loaded: entries.len(),
                        error: None,
                        kept_previous: false,
                    });
                    watchlists.push(Watchlist::new(tab, entries));
                }
                Err(e) => {
                    error!("Error loading tab '{}': {}", tab, e);
                    let kept = previous.watchlists.iter().find(|w| w.name == tab).cloned();
                    loads.push(TabLoad {
                        name: tab.clone(),
                        loaded: kept.as_ref().map_or(0, |w| w.entries.len()),
                        error: Some(e.to_string()),
                        kept_previous: kept.is_some(),
                    });
                    if let Some(watchlist) = kept {
                        watchlists.push(watchlist);
                    }
                }
            }
        }

        if reset_ledger {
            self.ledger.clear();
        }

        let total_entries = watchlists.iter().map(|w| w.entries.len()).sum();
        let generation = self.store.replace_all(watchlists);

        Ok(ReloadReport {
            generation,
            total_entries,
            ledger_reset: reset_ledger,
            tabs: loads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockReply;
    use crate::services::testing::harness;
    use std::time::Duration;

    fn entry<'a>(stats: &'a RefreshStats, watchlist: &str, scrip: &str) -> &'a WatchlistEntry {
        stats
            .watchlists
            .iter()
            .find(|w| w.name == watchlist)
            .and_then(|w| w.entries.iter().find(|e| e.scrip_name == scrip))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_load_and_below_target() {
        let h = harness();
        h.source.set_tab("Demo", &[("RELIANCE", 3000.0)]);
        h.provider.script("RELIANCE.NS", vec![MockReply::Closes(vec![2950.0, 3050.0])]);

        let stats = h.service.refresh_all().await.unwrap();
        assert_eq!(stats.total_stocks, 1);
        assert_eq!(stats.below_target, 1);
        assert_eq!(stats.new_hits_logged, 0);
        assert_eq!(entry(&stats, "Demo", "RELIANCE").current_price, Some(2950.0));
        assert_eq!(h.sink.len(), 0);

        let (_, stored) = h.service.store().get("Demo").unwrap();
        assert_eq!(stored.entries[0].status, Status::BelowTarget);
        assert_eq!(stored.entries[0].target_price, 3000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_logged_once_across_cycles() {
        let h = harness();
        h.source.set_tab("Demo", &[("RELIANCE", 3000.0)]);
        h.provider.script(
            "RELIANCE.NS",
            vec![
                MockReply::Closes(vec![2950.0, 3010.0]),
                MockReply::Closes(vec![3010.0, 3050.0]),
            ],
        );

        let first = h.service.refresh_one("Demo").await.unwrap();
        assert_eq!(entry(&first, "Demo", "RELIANCE").status, Status::BelowTarget);

        let second = h.service.refresh_one("Demo").await.unwrap();
        assert_eq!(entry(&second, "Demo", "RELIANCE").status, Status::TargetHit);
        assert_eq!(second.new_hits_logged, 1);

        let third = h.service.refresh_one("Demo").await.unwrap();
        assert_eq!(entry(&third, "Demo", "RELIANCE").status, Status::TargetHit);
        assert_eq!(third.new_hits_logged, 0);
        assert_eq!(h.sink.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_data_leaves_ledger_alone() {
        let h = harness();
        h.source.set_tab("Demo", &[("IDLE", 10.0)]);
        h.provider.script("IDLE.NS", vec![MockReply::Closes(vec![])]);

        let stats = h.service.refresh(None).await.unwrap();
        let idle = entry(&stats, "Demo", "IDLE");
        assert_eq!(idle.status, Status::NoData);
        assert_eq!(idle.current_price, Some(0.0));
        assert_eq!(stats.no_data, 1);
        assert_eq!(h.sink.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_watchlist_is_not_found() {
        let h = harness();
        h.source.set_tab("Demo", &[("RELIANCE", 3000.0)]);

        let err = h.service.refresh_one("Missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_source_is_nothing_to_refresh() {
        let h = harness();
        h.source.fail_tab("Intraday");

        let err = h.service.refresh_all().await.unwrap_err();
        match err {
            AppError::NothingToRefresh(message) => assert!(message.contains("Intraday")),
            other => panic!("unexpected error: {}", other),
        }
        assert!(h.service.state().await.watchlists.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_refresh_still_reports() {
        let h = harness();
        h.source.set_tab("Demo", &[("GONE", 10.0), ("HANG", 10.0)]);
        h.provider.script("GONE.NS", vec![MockReply::NotFound]);
        h.provider.script("HANG.NS", vec![MockReply::Hang]);

        let stats = h.service.refresh_all().await.unwrap();
        assert_eq!(stats.total_stocks, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tab_keeps_previous_entries() {
        let h = harness();
        h.source.set_tab("Intraday", &[("RELIANCE", 3000.0), ("TCS", 4000.0)]);
        h.source.set_tab("FIBOST", &[("IDEA", 12.0)]);
        h.service.reload(true).await.unwrap();

        h.source.fail_tab("Intraday");
        h.source.set_tab("FIBOST", &[("IDEA", 12.0), ("YESBANK", 25.0)]);
        let report = h.service.reload(false).await.unwrap();

        assert_eq!(report.total_entries, 4);
        assert!(report.tabs[0].kept_previous);
        assert!(report.tabs[0].error.is_some());
        assert_eq!(report.tabs[1].loaded, 2);
        assert_eq!(h.service.store().names(), vec!["Intraday", "FIBOST"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_with_reset_clears_ledger() {
        let h = harness();
        h.source.set_tab("Demo", &[("RELIANCE", 3000.0)]);
        h.provider.script("RELIANCE.NS", vec![MockReply::Closes(vec![3010.0, 3050.0])]);

        h.service.refresh_all().await.unwrap();
        assert!(h.service.ledger().is_logged("Demo", "RELIANCE"));

        h.service.reload(false).await.unwrap();
        assert!(h.service.ledger().is_logged("Demo", "RELIANCE"));

        let report = h.service.reload(true).await.unwrap();
        assert!(report.ledger_reset);
        assert!(!h.service.ledger().is_logged("Demo", "RELIANCE"));

        let stats = h.service.refresh_all().await.unwrap();
        assert_eq!(stats.new_hits_logged, 1);
        assert_eq!(h.sink.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resetting_reload_waits_for_in_flight_refresh() {
        let h = harness();
        h.source.set_tab("Demo", &[("SLOW", 10.0)]);
        h.provider.script(
            "SLOW.NS",
            vec![MockReply::Delayed(Duration::from_secs(5), vec![11.0, 12.0])],
        );
        h.service.reload(false).await.unwrap();

        let service = h.service.clone();
        let refresh = tokio::spawn(async move { service.refresh_one("Demo").await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        let report = h.service.reload(true).await.unwrap();
        assert!(report.ledger_reset);

        // The refresh finished first, then the reset cleared its flag
        let stats = refresh.await.unwrap().unwrap();
        assert!(stats.watchlists[0].applied);
        assert_eq!(stats.new_hits_logged, 1);
        assert!(!h.service.ledger().is_logged("Demo", "SLOW"));

        let (_, stored) = h.service.store().get("Demo").unwrap();
        assert_eq!(stored.entries[0].status, Status::NotFetched);
        assert_eq!(h.sink.len(), 1);

        // Ledger and store agree, so the next crossing is logged again
        let stats = h.service.refresh_one("Demo").await.unwrap();
        assert_eq!(stats.new_hits_logged, 1);
        assert_eq!(h.sink.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_first_use_loads_once() {
        let h = harness();
        h.source.set_tab("Demo", &[("RELIANCE", 3000.0)]);
        h.source.set_latency(Duration::from_secs(2));
        h.provider.script("RELIANCE.NS", vec![MockReply::Closes(vec![2950.0, 3050.0])]);

        let a = h.service.clone();
        let b = h.service.clone();
        let (first, second) = tokio::join!(a.refresh_all(), b.refresh_all());

        assert!(first.unwrap().watchlists[0].applied);
        assert!(second.unwrap().watchlists[0].applied);
        let (generation, _) = h.service.store().get("Demo").unwrap();
        assert_eq!(generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_watchlist_refreshes_are_serialised() {
        let h = harness();
        h.source.set_tab("Demo", &[("SLOW", 10.0)]);
        h.provider.script(
            "SLOW.NS",
            vec![MockReply::Delayed(Duration::from_secs(5), vec![8.0, 9.0])],
        );
        h.service.reload(false).await.unwrap();

        let a = h.service.clone();
        let b = h.service.clone();
        let (first, second) = tokio::join!(a.refresh_one("Demo"), b.refresh_one("Demo"));

        assert!(first.is_ok() && second.is_ok());
        assert_eq!(h.provider.calls("SLOW.NS"), 2);
        assert_eq!(h.provider.max_in_flight(), 1);
    }
}
