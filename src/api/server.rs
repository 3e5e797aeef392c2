//! Game server
//!
//! HTTP and WebSocket front end for the round engine.

use super::websocket::{ws_handler, WsNotifier};
use crate::common::types::{HistoryRecord, HistorySummary, Wallet};
use crate::config::ServerConfig;
use crate::errors::{ConfigurationError, CrashResult};
use crate::games::engine::RoundEngine;
use crate::metrics::MetricsSnapshot;
use crate::storage::InMemoryLedger;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Shared state for request handlers
pub struct AppState {
    pub engine: RoundEngine,
    pub notifier: Arc<WsNotifier>,
    pub ledger: Arc<InMemoryLedger>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_rounds: usize,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub summary: HistorySummary,
    pub records: Vec<HistoryRecord>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/history/:player_id/:wallet", get(history))
        .route("/ws/:player_id", get(ws_handler))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_rounds: state.engine.active_count(),
        connections: state.notifier.connection_count(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.engine.metrics().snapshot())
}

async fn history(
    State(state): State<Arc<AppState>>,
    Path((player_id, wallet)): Path<(String, Wallet)>,
) -> Result<Json<HistoryResponse>, (StatusCode, String)> {
    let records = state
        .ledger
        .history(&player_id, wallet)
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;

    Ok(Json(HistoryResponse {
        summary: HistorySummary::from_records(&records),
        records,
    }))
}

pub struct GameServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl GameServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    pub async fn run(self) -> CrashResult<()> {
        let addr = self.socket_addr()?;
        let app = create_router(self.state.clone())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("Crash game server listening on {}", addr);
        info!("   GET  /health                      - Health check");
        info!("   GET  /metrics                     - Round counters");
        info!("   GET  /history/:player_id/:wallet  - Game history");
        info!("   GET  /ws/:player_id               - Live rounds (WebSocket)");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.state.engine.clone()))
            .await?;

        info!("Server stopped");
        Ok(())
    }

    fn socket_addr(&self) -> CrashResult<SocketAddr> {
        let ip = self.config.host.parse::<std::net::IpAddr>().map_err(|_| {
            ConfigurationError::invalid("server.host", &self.config.host, "Not an IP address")
        })?;
        Ok(SocketAddr::from((ip, self.config.port)))
    }
}

/// Wait for Ctrl+C or SIGTERM, then void every running round
async fn shutdown_signal(engine: RoundEngine) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    for ticket in engine.cancel_all() {
        info!(
            "Voided round {} of player {} (bet {:.2})",
            ticket.round_id, ticket.player_id, ticket.bet_amount
        );
    }
}
