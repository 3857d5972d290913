//! HTTP API for health checks, status, and read-only swap lookups

use crate::config::ApiConfig;
use crate::error::OrchestratorResult;
use crate::ledger::{Ledger, PgLedger};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<PgLedger>,
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, ledger: Arc<PgLedger>) -> OrchestratorResult<()> {
    let state = AppState { ledger };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/transactions/:id", get(get_transaction))
        .route("/wallets/:address/transactions", get(get_wallet_transactions))
        .route("/stats", get(get_stats))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| crate::error::OrchestratorError::Internal(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::OrchestratorError::Internal(e.to_string()))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - verify the database is reachable
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.ledger.health_check().await.is_ok();

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready: db_ok,
            database: db_ok,
        }),
    )
}

/// Look up one swap row by id
async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match Uuid::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "invalid transaction id" })),
            )
        }
    };

    match state.ledger.get(id).await {
        Ok(tx) => (StatusCode::OK, Json(serde_json::json!(tx))),
        Err(crate::error::OrchestratorError::TransactionNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "transaction not found" })),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "internal error" })),
        ),
    }
}

/// List swap rows for a wallet, newest first
async fn get_wallet_transactions(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    match state.ledger.get_by_wallet(&address).await {
        Ok(txs) => (StatusCode::OK, Json(serde_json::json!(txs))),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "internal error" })),
        ),
    }
}

/// Swap row counts
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.ledger.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(StatsResponse {
                in_flight: stats.in_flight,
                completed: stats.completed,
                failed: stats.failed,
            }),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatsResponse {
                in_flight: 0,
                completed: 0,
                failed: 0,
            }),
        ),
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    database: bool,
}

#[derive(Serialize)]
struct StatsResponse {
    in_flight: u64,
    completed: u64,
    failed: u64,
}
