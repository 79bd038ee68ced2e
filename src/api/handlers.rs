//! Control surface handlers
//!
//! Provides handlers for:
//! - Watchlist state and reload (/api/watchlists, /api/refresh-sheet)
//! - Price refresh (/api/refresh-all-prices, /api/refresh-tab/{tab_name})
//! - Scheduler status and manual trigger (/api/scheduler)
//! - Hit log (/api/hits)

use crate::api::types::*;
use crate::error::AppError;
use crate::ledger::LedgerRecord;
use crate::scheduler::{SchedulerStatus, TriggerOutcome};
use crate::services::{RefreshStats, ReloadReport};
use crate::state::AppState;
use crate::watchlist::StoreSnapshot;
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::NothingToRefresh(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Source { .. } | AppError::Http(_) => StatusCode::BAD_GATEWAY,
        AppError::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply<T: Serialize>(err: AppError) -> Reply<T> {
    (status_for(&err), Json(ApiResponse::error(&err)))
}

fn refresh_message(stats: &RefreshStats) -> String {
    format!(
        "Refreshed {} stocks in {:.2}s: {} target hits ({} new), {} errors, {} timeouts",
        stats.total_stocks,
        stats.processing_time_secs,
        stats.target_hits,
        stats.new_hits_logged,
        stats.errors,
        stats.timeouts
    )
}

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint - GET /health or GET /
pub async fn health_check() -> Json<ApiResponse<Empty>> {
    Json(ApiResponse::success_with_message("Target Watch API is running"))
}

// ============================================================================
// Watchlists
// ============================================================================

/// Current watchlist state - GET /api/watchlists
///
/// Loads from the source first when nothing has been loaded yet.
pub async fn get_watchlists(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StoreSnapshot>> {
    let snapshot = state.service.state().await;
    Json(ApiResponse::success(
        format!(
            "{} watchlists, {} stocks",
            snapshot.watchlists.len(),
            snapshot.total_entries()
        ),
        snapshot,
    ))
}

/// Reload watchlists from the source - POST /api/refresh-sheet?reset_ledger=
pub async fn refresh_sheet(
    State(state): State<Arc<AppState>>,
    query: Option<Query<ReloadQuery>>,
) -> Reply<ReloadReport> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    info!("Reloading watchlists (reset_ledger={})", query.reset_ledger);

    match state.service.reload(query.reset_ledger).await {
        Ok(report) => {
            let failed = report.tabs.iter().filter(|t| t.error.is_some()).count();
            let message = format!(
                "Loaded {} stocks from {} tabs ({} failed)",
                report.total_entries,
                report.tabs.len(),
                failed
            );
            (StatusCode::OK, Json(ApiResponse::success(message, report)))
        }
        Err(e) => {
            error!("Watchlist reload failed: {}", e);
            error_reply(e)
        }
    }
}

// ============================================================================
// Price Refresh
// ============================================================================

/// Refresh every watchlist - POST /api/refresh-all-prices
pub async fn refresh_all_prices(State(state): State<Arc<AppState>>) -> Reply<RefreshStats> {
    match state.service.refresh_all().await {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::success(refresh_message(&stats), stats))),
        Err(e) => {
            warn!("Refresh of all watchlists failed: {}", e);
            error_reply(e)
        }
    }
}

/// Refresh one watchlist - POST /api/refresh-tab/{tab_name}
pub async fn refresh_tab(State(state): State<Arc<AppState>>, Path(tab_name): Path<String>) -> Reply<RefreshStats> {
    match state.service.refresh_one(&tab_name).await {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::success(refresh_message(&stats), stats))),
        Err(e) => {
            warn!("Refresh of '{}' failed: {}", tab_name, e);
            error_reply(e)
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Scheduler status - GET /api/scheduler
pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SchedulerStatus>> {
    Json(ApiResponse::success_with_data(state.scheduler.status()))
}

/// Run one gated trigger now - POST /api/scheduler/trigger
pub async fn scheduler_trigger(State(state): State<Arc<AppState>>) -> Json<ApiResponse<TriggerOutcome>> {
    let outcome = state.scheduler.trigger().await;
    let message = match &outcome {
        TriggerOutcome::Skipped { reason } => format!("Skipped: {}", reason),
        TriggerOutcome::Refreshed { total_stocks, .. } => format!("Refreshed {} stocks", total_stocks),
        TriggerOutcome::Failed { message } => format!("Refresh failed: {}", message),
    };
    Json(ApiResponse::success(message, outcome))
}

// ============================================================================
// Hit Log
// ============================================================================

/// Persisted target hits - GET /api/hits
pub async fn get_hits(State(state): State<Arc<AppState>>) -> Reply<Vec<LedgerRecord>> {
    match state.service.ledger().records() {
        Ok(records) => (StatusCode::OK, Json(ApiResponse::success_with_data(records))),
        Err(e) => {
            error!("Failed to read hit log: {}", e);
            error_reply(e)
        }
    }
}
