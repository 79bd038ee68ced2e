//! Target-hit ledger
//!
//! Tracks, per (watchlist, scrip), whether the current hit streak has already
//! been written to the hit log. The sticky flag is only set after the sink
//! accepted the row, so a failed write is retried on the next cycle.

mod csv_sink;
mod sqlite_sink;

pub use csv_sink::CsvHitSink;
pub use sqlite_sink::SqliteHitSink;

use crate::error::{AppError, Result};
use crate::scheduler::Clock;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Persisted hit-log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub watchlist_name: String,
    pub scrip_name: String,
    pub target_price: f64,
    pub hit_price: f64,
    /// `YYYY-MM-DD` in the trading timezone
    pub date: String,
    /// `HH:MM:SS` in the trading timezone
    pub time: String,
}

/// Append-only hit-log store
pub trait HitSink: Send + Sync {
    /// Sink type (e.g., "csv", "sqlite")
    fn kind(&self) -> &'static str;

    /// Append one row, creating the store if absent
    fn append(&self, record: &LedgerRecord) -> Result<()>;

    /// Read back every row in append order
    fn records(&self) -> Result<Vec<LedgerRecord>>;
}

/// Sticky-flag ledger in front of a `HitSink`
pub struct HitLedger {
    logged: DashMap<(String, String), DateTime<Utc>>,
    sink: Arc<dyn HitSink>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    rearm_on_drop: bool,
}

impl HitLedger {
    pub fn new(sink: Arc<dyn HitSink>, clock: Arc<dyn Clock>, timezone: Tz, rearm_on_drop: bool) -> Self {
        Self {
            logged: DashMap::new(),
            sink,
            clock,
            timezone,
            rearm_on_drop,
        }
    }

    /// The hit predicate (inclusive)
    pub fn is_hit(target_price: f64, current_price: f64) -> bool {
        current_price >= target_price
    }

    /// Append a hit record unless this streak was already logged.
    ///
    /// Returns true iff a new record was appended. A price below target
    /// re-arms the flag when `rearm_on_drop` is set. The sink write runs on
    /// the blocking pool.
    pub async fn record_if_new_hit(
        &self,
        watchlist: &str,
        scrip: &str,
        target_price: f64,
        current_price: f64,
    ) -> bool {
        let key = (watchlist.to_string(), scrip.to_string());

        if !Self::is_hit(target_price, current_price) {
            if self.rearm_on_drop && self.logged.remove(&key).is_some() {
                info!("Re-armed hit flag for {}/{} at {}", watchlist, scrip, current_price);
            }
            return false;
        }

        if self.logged.contains_key(&key) {
            return false;
        }

        let now = self.clock.now();
        let local = now.with_timezone(&self.timezone);
        let record = LedgerRecord {
            watchlist_name: watchlist.to_string(),
            scrip_name: scrip.to_string(),
            target_price,
            hit_price: current_price,
            date: local.format("%Y-%m-%d").to_string(),
            time: local.format("%H:%M:%S").to_string(),
        };

        let sink = self.sink.clone();
        let written = tokio::task::spawn_blocking(move || sink.append(&record))
            .await
            .unwrap_or_else(|e| Err(AppError::Internal(format!("hit log write task failed: {}", e))));

        match written {
            Ok(()) => {
                self.logged.insert(key, now);
                info!(
                    "Target hit logged: {}/{} at {} (target {})",
                    watchlist, scrip, current_price, target_price
                );
                true
            }
            Err(e) => {
                error!(
                    "Failed to log target hit for {}/{} to {} sink: {}",
                    watchlist,
                    scrip,
                    self.sink.kind(),
                    e
                );
                false
            }
        }
    }

    /// Whether the current streak for this pair has been logged
    pub fn is_logged(&self, watchlist: &str, scrip: &str) -> bool {
        self.logged
            .contains_key(&(watchlist.to_string(), scrip.to_string()))
    }

    /// Full state reset (explicit ledger-clearing reload)
    pub fn clear(&self) {
        self.logged.clear();
        info!("Hit ledger cleared");
    }

    /// Persisted hit log
    pub fn records(&self) -> Result<Vec<LedgerRecord>> {
        self.sink.records()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::AppError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory sink that can be switched into a failing state
    #[derive(Default)]
    pub struct MemorySink {
        pub rows: Mutex<Vec<LedgerRecord>>,
        pub failing: AtomicBool,
    }

    impl MemorySink {
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn len(&self) -> usize {
            self.rows.lock().len()
        }
    }

    impl HitSink for MemorySink {
        fn kind(&self) -> &'static str {
            "memory"
        }

        fn append(&self, record: &LedgerRecord) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(AppError::Ledger("sink unavailable".to_string()));
            }
            self.rows.lock().push(record.clone());
            Ok(())
        }

        fn records(&self) -> Result<Vec<LedgerRecord>> {
            Ok(self.rows.lock().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemorySink;
    use super::*;
    use crate::scheduler::ManualClock;
    use chrono::TimeZone;

    fn ledger(rearm: bool) -> (HitLedger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        // 2026-10-14 05:00:00 UTC == 10:30:00 IST
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 14, 5, 0, 0).unwrap()));
        let ledger = HitLedger::new(sink.clone(), clock, chrono_tz::Asia::Kolkata, rearm);
        (ledger, sink)
    }

    #[tokio::test]
    async fn test_hit_is_logged_once_per_streak() {
        let (ledger, sink) = ledger(true);

        assert!(ledger.record_if_new_hit("Demo", "RELIANCE", 3000.0, 3010.0).await);
        assert!(!ledger.record_if_new_hit("Demo", "RELIANCE", 3000.0, 3050.0).await);
        assert_eq!(sink.len(), 1);

        let row = &sink.rows.lock()[0];
        assert_eq!(row.hit_price, 3010.0);
        assert_eq!(row.date, "2026-10-14");
        assert_eq!(row.time, "10:30:00");
    }

    #[tokio::test]
    async fn test_boundary_price_is_a_hit() {
        let (ledger, sink) = ledger(true);
        assert!(ledger.record_if_new_hit("Demo", "TCS", 4000.0, 4000.0).await);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_drop_below_target_rearms() {
        let (ledger, sink) = ledger(true);

        assert!(ledger.record_if_new_hit("Demo", "RELIANCE", 3000.0, 3010.0).await);
        assert!(!ledger.record_if_new_hit("Demo", "RELIANCE", 3000.0, 2990.0).await);
        assert!(!ledger.is_logged("Demo", "RELIANCE"));
        assert!(ledger.record_if_new_hit("Demo", "RELIANCE", 3000.0, 3020.0).await);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_without_rearm_logs_once_forever() {
        let (ledger, sink) = ledger(false);

        assert!(ledger.record_if_new_hit("Demo", "RELIANCE", 3000.0, 3010.0).await);
        assert!(!ledger.record_if_new_hit("Demo", "RELIANCE", 3000.0, 2990.0).await);
        assert!(!ledger.record_if_new_hit("Demo", "RELIANCE", 3000.0, 3020.0).await);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_is_retried_next_cycle() {
        let (ledger, sink) = ledger(true);

        sink.set_failing(true);
        assert!(!ledger.record_if_new_hit("Demo", "RELIANCE", 3000.0, 3010.0).await);
        assert!(!ledger.is_logged("Demo", "RELIANCE"));

        sink.set_failing(false);
        assert!(ledger.record_if_new_hit("Demo", "RELIANCE", 3000.0, 3010.0).await);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_are_per_watchlist() {
        let (ledger, sink) = ledger(true);

        assert!(ledger.record_if_new_hit("Intraday", "INFY", 1500.0, 1510.0).await);
        assert!(ledger.record_if_new_hit("FIBOST", "INFY", 1500.0, 1510.0).await);
        assert_eq!(sink.len(), 2);

        ledger.clear();
        assert!(!ledger.is_logged("Intraday", "INFY"));
        assert!(!ledger.is_logged("FIBOST", "INFY"));
        assert!(ledger.record_if_new_hit("Intraday", "INFY", 1500.0, 1510.0).await);
        assert_eq!(sink.len(), 3);
    }
}
