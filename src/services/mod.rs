//! Services Layer
//!
//! Refresh pipeline logic shared by the scheduler and the HTTP handlers.
//!
//! # Architecture
//!
//! ```text
//! Scheduler ──┐
//!             ├──> RefreshService --> BatchExecutor --> PriceFetcher --> Provider
//! HTTP API ───┘          │                  │
//!                        v                  v
//!                 WatchlistStore        HitLedger --> HitSink
//! ```
//!
//! # Services
//!
//! - `RetryPolicy` - Bounded attempts with capped exponential backoff
//! - `PriceFetcher` - Latest closed-candle price for one symbol
//! - `BatchExecutor` - Bounded-concurrency batches with deadlines
//! - `RefreshService` - Refresh orchestration and watchlist reload

pub mod batch_executor;
pub mod price_fetcher;
pub mod refresh_service;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use batch_executor::{BatchExecutor, BatchOutput, BatchSettings, RunSummary};
pub use price_fetcher::{select_price, FetchOutcome, PriceFetcher, PriceQuote};
pub use refresh_service::{RefreshService, RefreshStats, ReloadReport, TabLoad, WatchlistReport};
pub use retry::RetryPolicy;
