//! Periodic refresh scheduler
//!
//! Fires on a fixed cadence aligned to local midnight in the trading
//! timezone (default every 15 minutes, 15 seconds past the slot). Each
//! trigger consults the market-hours gate; outside the session it is a
//! logged no-op.

use super::{Clock, GateDecision, MarketHoursGate};
use crate::config::SchedulerConfig;
use crate::services::RefreshService;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

const DAY_MS: i64 = 24 * 3600 * 1000;

/// Result of one trigger
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Skipped {
        reason: GateDecision,
    },
    Refreshed {
        run_id: Uuid,
        total_stocks: usize,
        target_hits: usize,
        new_hits_logged: usize,
        errors: usize,
        timeouts: usize,
    },
    Failed {
        message: String,
    },
}

/// Scheduler status exposed over HTTP
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub cadence_minutes: u32,
    pub offset_secs: u32,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_trigger_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<TriggerOutcome>,
    pub triggers: u64,
    pub refreshes: u64,
}

/// Time until the next `k * cadence + offset` slot after `now`, counted
/// from local midnight in `tz`. A slot exactly at `now` is not returned.
pub fn duration_until_next_slot(now: DateTime<Utc>, tz: Tz, cadence_minutes: u32, offset_secs: u32) -> Duration {
    let local = now.with_timezone(&tz);
    let since_midnight_ms =
        local.num_seconds_from_midnight() as i64 * 1000 + (local.nanosecond() % 1_000_000_000) as i64 / 1_000_000;

    let period_ms = (cadence_minutes.max(1) as i64) * 60 * 1000;
    let offset_ms = offset_secs as i64 * 1000;

    let next_ms = if since_midnight_ms < offset_ms {
        offset_ms
    } else {
        ((since_midnight_ms - offset_ms) / period_ms + 1) * period_ms + offset_ms
    };
    // First slot of the next day
    let next_ms = next_ms.min(DAY_MS + offset_ms);

    Duration::from_millis((next_ms - since_midnight_ms).max(0) as u64)
}

pub struct RefreshScheduler {
    service: Arc<RefreshService>,
    gate: MarketHoursGate,
    clock: Arc<dyn Clock>,
    cadence_minutes: u32,
    offset_secs: u32,
    status: RwLock<SchedulerStatus>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        service: Arc<RefreshService>,
        gate: MarketHoursGate,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            service,
            gate,
            clock,
            cadence_minutes: config.cadence_minutes,
            offset_secs: config.offset_secs,
            status: RwLock::new(SchedulerStatus {
                cadence_minutes: config.cadence_minutes,
                offset_secs: config.offset_secs,
                ..SchedulerStatus::default()
            }),
            shutdown_tx: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status.read().running
    }

    /// Start the periodic loop; returns false if already running
    pub fn start(self: &Arc<Self>) -> bool {
        let mut shutdown_slot = self.shutdown_tx.lock();
        if shutdown_slot.is_some() {
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        *shutdown_slot = Some(shutdown_tx);
        self.status.write().running = true;

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            info!(
                "Refresh scheduler started: every {} minutes at +{}s",
                scheduler.cadence_minutes, scheduler.offset_secs
            );

            loop {
                let now = scheduler.clock.now();
                let wait = duration_until_next_slot(
                    now,
                    scheduler.gate.timezone(),
                    scheduler.cadence_minutes,
                    scheduler.offset_secs,
                );
                let next_run_at = chrono::Duration::from_std(wait).ok().map(|d| now + d);
                scheduler.status.write().next_run_at = next_run_at;
                info!(
                    "Next refresh trigger in {} minutes {} seconds",
                    wait.as_secs() / 60,
                    wait.as_secs() % 60
                );

                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = tokio::time::sleep(wait) => {
                        scheduler.trigger().await;
                    }
                }
            }

            info!("Refresh scheduler stopped");
        });

        *self.handle.lock() = Some(handle);
        true
    }

    /// Stop the loop and wait for it to exit; returns false if not running
    pub async fn stop(&self) -> bool {
        let Some(shutdown_tx) = self.shutdown_tx.lock().take() else {
            return false;
        };
        let _ = shutdown_tx.send(());

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Refresh scheduler task failed: {}", e);
            }
        }

        let mut status = self.status.write();
        status.running = false;
        status.next_run_at = None;
        true
    }

    /// Run one gated trigger now
    pub async fn trigger(&self) -> TriggerOutcome {
        let now = self.clock.now();
        let decision = self.gate.decide(now);

        let outcome = if !decision.is_open() {
            info!(
                "Skipping price refresh at {}: {}",
                now.with_timezone(&self.gate.timezone()).format("%Y-%m-%d %H:%M:%S"),
                decision
            );
            TriggerOutcome::Skipped { reason: decision }
        } else {
            info!("Market open, running scheduled price refresh...");
            match self.service.refresh(None).await {
                Ok(stats) => TriggerOutcome::Refreshed {
                    run_id: stats.run_id,
                    total_stocks: stats.total_stocks,
                    target_hits: stats.target_hits,
                    new_hits_logged: stats.new_hits_logged,
                    errors: stats.errors,
                    timeouts: stats.timeouts,
                },
                Err(e) => {
                    error!("Scheduled price refresh failed: {}", e);
                    TriggerOutcome::Failed { message: e.to_string() }
                }
            }
        };

        let mut status = self.status.write();
        status.triggers += 1;
        if matches!(outcome, TriggerOutcome::Refreshed { .. }) {
            status.refreshes += 1;
        }
        status.last_trigger_at = Some(now);
        status.last_outcome = Some(outcome.clone());
        outcome
    }
}
