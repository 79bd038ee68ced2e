//! Batch Executor
//!
//! Splits a watchlist into fixed-size batches and runs each batch under one
//! concurrency/timeout envelope:
//!
//! - at most `max_workers` fetches in flight at any instant (semaphore)
//! - a per-task deadline, started once the task is admitted
//! - a per-batch deadline after which unfinished tasks are abandoned
//! - a fixed pause between batches (not after the last one)
//!
//! Every input entry comes back exactly once, as a result or with a
//! `Timeout`/`Error` status.

use crate::config::RefreshConfig;
use crate::ledger::HitLedger;
use crate::services::price_fetcher::{FetchOutcome, PriceFetcher};
use crate::watchlist::{normalize_symbol, Status, WatchlistEntry};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Envelope settings for batch execution
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub max_workers: usize,
    pub task_timeout: Duration,
    pub batch_timeout: Duration,
    pub batch_delay: Duration,
    pub default_suffix: String,
}

impl BatchSettings {
    pub fn from_config(config: &RefreshConfig, default_suffix: &str) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_workers: config.max_workers.max(1),
            task_timeout: config.task_timeout(),
            batch_timeout: config.batch_timeout(),
            batch_delay: config.batch_delay(),
            default_suffix: default_suffix.to_string(),
        }
    }
}

/// Output of one batch
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    pub entries: Vec<WatchlistEntry>,
    pub new_hits: usize,
}

/// Output of a full watchlist run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub entries: Vec<WatchlistEntry>,
    pub new_hits: usize,
    pub batches: usize,
}

/// How one task ended
enum TaskOutcome {
    Done { entry: WatchlistEntry, new_hit: bool },
    TimedOut,
    Panicked(String),
}

pub struct BatchExecutor {
    fetcher: Arc<PriceFetcher>,
    ledger: Arc<HitLedger>,
    settings: BatchSettings,
}

impl BatchExecutor {
    pub fn new(fetcher: Arc<PriceFetcher>, ledger: Arc<HitLedger>, settings: BatchSettings) -> Self {
        Self {
            fetcher,
            ledger,
            settings,
        }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Run every entry of a watchlist and return the updated entries
    pub async fn run(&self, entries: Vec<WatchlistEntry>, watchlist: &str) -> Vec<WatchlistEntry> {
        self.run_with(entries, watchlist, |_| {}).await.entries
    }

    /// Run every entry, handing each completed batch to `on_batch` before
    /// the next batch starts
    pub async fn run_with<F>(&self, entries: Vec<WatchlistEntry>, watchlist: &str, mut on_batch: F) -> RunSummary
    where
        F: FnMut(&BatchOutput),
    {
        let total = entries.len();
        let size = self.settings.batch_size;
        let total_batches = total.div_ceil(size);
        let mut summary = RunSummary {
            entries: Vec::with_capacity(total),
            ..RunSummary::default()
        };

        for (i, chunk) in entries.chunks(size).enumerate() {
            info!(
                "Processing batch {}/{} ({} stocks) for {}",
                i + 1,
                total_batches,
                chunk.len(),
                watchlist
            );

            let output = self.run_batch(chunk.to_vec(), watchlist).await;
            on_batch(&output);

            summary.new_hits += output.new_hits;
            summary.entries.extend(output.entries);
            summary.batches += 1;

            if i + 1 < total_batches && !self.settings.batch_delay.is_zero() {
                info!("Waiting {:?} before next batch...", self.settings.batch_delay);
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        summary
    }

    /// Run one batch under the concurrency and deadline envelope
    pub async fn run_batch(&self, batch: Vec<WatchlistEntry>, watchlist: &str) -> BatchOutput {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_workers));
        let mut tasks = JoinSet::new();

        for (idx, entry) in batch.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            let ledger = self.ledger.clone();
            let watchlist = watchlist.to_string();
            let suffix = self.settings.default_suffix.clone();
            let task_timeout = self.settings.task_timeout;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (idx, TaskOutcome::Panicked("worker pool closed".to_string()));
                };

                let work = AssertUnwindSafe(process_entry(fetcher, ledger, watchlist, suffix, entry)).catch_unwind();

                let outcome = match tokio::time::timeout(task_timeout, work).await {
                    Ok(Ok((entry, new_hit))) => TaskOutcome::Done { entry, new_hit },
                    Ok(Err(panic)) => TaskOutcome::Panicked(panic_message(panic)),
                    Err(_) => TaskOutcome::TimedOut,
                };
                (idx, outcome)
            });
        }

        let deadline = Instant::now() + self.settings.batch_timeout;
        let mut slots: Vec<Option<(WatchlistEntry, bool)>> = vec![None; batch.len()];
        let mut deadline_hit = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((idx, outcome)))) => {
                    let original = &batch[idx];
                    let result = match outcome {
                        TaskOutcome::Done { entry, new_hit } => (entry, new_hit),
                        TaskOutcome::TimedOut => {
                            warn!(
                                "Timeout fetching {} after {:?}",
                                original.scrip_name, self.settings.task_timeout
                            );
                            (failed(original, Status::Timeout), false)
                        }
                        TaskOutcome::Panicked(message) => {
                            error!("Batch processing error for {}: {}", original.scrip_name, message);
                            (failed(original, Status::Error), false)
                        }
                    };
                    slots[idx] = Some(result);
                }
                Ok(Some(Err(join_error))) => {
                    error!("Fetch task failed in {}: {}", watchlist, join_error);
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    warn!(
                        "Batch deadline of {:?} reached for {}, abandoning {} task(s)",
                        self.settings.batch_timeout,
                        watchlist,
                        tasks.len()
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        let abandoned = if deadline_hit { Status::Timeout } else { Status::Error };
        let mut output = BatchOutput::default();
        for (slot, original) in slots.into_iter().zip(batch.iter()) {
            let (entry, new_hit) = slot.unwrap_or_else(|| (failed(original, abandoned), false));
            if new_hit {
                output.new_hits += 1;
            }
            output.entries.push(entry);
        }

        info!(
            "Batch completed: {} stocks processed for {}",
            output.entries.len(),
            watchlist
        );
        output
    }
}

/// Normalizer -> fetcher -> status -> ledger, for one entry
async fn process_entry(
    fetcher: Arc<PriceFetcher>,
    ledger: Arc<HitLedger>,
    watchlist: String,
    suffix: String,
    mut entry: WatchlistEntry,
) -> (WatchlistEntry, bool) {
    entry.normalized_symbol = normalize_symbol(&entry.scrip_name, &suffix);
    let quote = fetcher.fetch(&entry.normalized_symbol).await;

    let mut new_hit = false;
    match quote.outcome {
        FetchOutcome::Ok => {
            let status = if HitLedger::is_hit(entry.target_price, quote.price) {
                Status::TargetHit
            } else {
                Status::BelowTarget
            };
            entry.set_price(quote.price, status);
            new_hit = ledger
                .record_if_new_hit(&watchlist, &entry.scrip_name, entry.target_price, quote.price)
                .await;
        }
        FetchOutcome::NoData => entry.set_failed(Status::NoData),
        FetchOutcome::Error => entry.set_failed(Status::Error),
    }

    info!(
        "{}: {} ({})",
        entry.scrip_name,
        entry.current_price.unwrap_or_default(),
        entry.status
    );
    (entry, new_hit)
}

fn failed(original: &WatchlistEntry, status: Status) -> WatchlistEntry {
    let mut entry = original.clone();
    entry.set_failed(status);
    entry
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
