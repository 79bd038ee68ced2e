//! HTTP server for the control surface
//!
//! Provides:
//! - Health check (/health)
//! - Watchlist state, reload and refresh routes (/api/*)
//! - Scheduler status and manual trigger (/api/scheduler*)

use crate::api::handlers;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the router with all routes
pub fn router(state: Arc<AppState>) -> Router {
    // Build CORS layer (allow all for local dashboards)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ================================================================
        // Health check
        // ================================================================
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::health_check))

        // ================================================================
        // Watchlists
        // ================================================================
        .route("/api/watchlists", get(handlers::get_watchlists))
        .route("/api/refresh-sheet", post(handlers::refresh_sheet))

        // ================================================================
        // Price refresh
        // ================================================================
        .route("/api/refresh-all-prices", post(handlers::refresh_all_prices))
        .route("/api/refresh-tab/:tab_name", post(handlers::refresh_tab))

        // ================================================================
        // Scheduler and hit log
        // ================================================================
        .route("/api/scheduler", get(handlers::scheduler_status))
        .route("/api/scheduler/trigger", post(handlers::scheduler_trigger))
        .route("/api/hits", get(handlers::get_hits))

        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server manager
pub struct ApiServer {
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            shutdown_tx: None,
        }
    }

    /// Bind and serve in the background; returns the bound address
    pub async fn start(&mut self, host: &str, port: u16) -> Result<SocketAddr> {
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid address {}:{}: {}", host, port, e)))?;

        let app = router(self.state.clone());

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        info!("Starting Target Watch API server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?;

        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            });

            if let Err(e) = server.await {
                error!("API server error: {}", e);
            }
        });

        info!("Target Watch API server started on {}", bound);
        info!("");
        info!("=== Endpoints ===");
        info!("  GET  http://{}/health", bound);
        info!("  GET  http://{}/api/watchlists", bound);
        info!("  POST http://{}/api/refresh-sheet?reset_ledger=true", bound);
        info!("  POST http://{}/api/refresh-all-prices", bound);
        info!("  POST http://{}/api/refresh-tab/{{tab_name}}", bound);
        info!("  GET  http://{}/api/scheduler", bound);
        info!("  POST http://{}/api/scheduler/trigger", bound);
        info!("  GET  http://{}/api/hits", bound);

        Ok(bound)
    }

    /// Stop the server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server stop signal sent");
        }
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}
