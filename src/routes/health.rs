// src/routes/health.rs
//! API health check endpoint for the EcoVolt backend.
//!
//! This module defines the `/health` route used by container orchestrators
//! and CI pipelines to verify that the service is running. It is a sibling
//! module in the `routes` directory and follows the Explicit Module Boundary
//! Pattern (EMBP):
//! - Internal to this file: endpoint handler(s) and related types
//! - Exports to the gateway (`mod.rs`): a subrouter containing the `/health` route

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    ledger_transactions: usize,
}

/// Handle `GET /health`.
///
/// Pings the ledger database and reports how many transactions the current
/// ledger snapshot holds. Telemetry is not contacted.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // ---
    let database_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let ledger = state.ledger.current();

    let (code, status, database) = if database_ok {
        (StatusCode::OK, "ok", "up")
    } else {
        tracing::warn!("Health check could not reach the database");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded", "down")
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            ledger_transactions: ledger.transaction_count,
        }),
    )
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
