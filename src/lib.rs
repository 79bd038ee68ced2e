//! Target Watch - Watchlist Price Refresh Service
//!
//! Periodically refreshes prices for Google Sheet (or CSV) watchlists of NSE
//! scrips and logs each first crossing of a target price exactly once.

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod providers;
pub mod scheduler;
pub mod services;
pub mod sources;
pub mod state;
pub mod watchlist;

use api::ApiServer;
use config::AppConfig;
use error::Result;
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "target_watch=debug,target_watch_lib=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the service until Ctrl+C
pub async fn run(config: AppConfig, start_scheduler: bool) -> Result<()> {
    tracing::info!("Starting Target Watch...");

    let host = config.server.host.clone();
    let port = config.server.port;
    let scheduler_enabled = start_scheduler && config.scheduler.enabled;

    let state = Arc::new(AppState::new(config)?);

    // Initial load; a failure here is retried lazily on first use
    match state.service.reload(true).await {
        Ok(report) => tracing::info!(
            "Loaded {} stocks from {} watchlists",
            report.total_entries,
            report.tabs.len()
        ),
        Err(e) => tracing::error!("Initial watchlist load failed: {}", e),
    }

    if scheduler_enabled {
        state.scheduler.start();
    } else {
        tracing::info!("Refresh scheduler disabled");
    }

    let mut server = ApiServer::new(state.clone());
    server.start(&host, port).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    server.stop();
    state.scheduler.stop().await;

    tracing::info!("Target Watch stopped");
    Ok(())
}
