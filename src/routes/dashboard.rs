//! Dashboard endpoint: live status cards, threshold alerts and trend series.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::AppState;
use crate::error::AppError;
use crate::live::{trend, LiveStatus, TrendPoint};
use crate::store;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/dashboard", get(handler))
}

#[derive(Debug, Serialize)]
struct DashboardResponse {
    status: LiveStatus,
    history: Vec<TrendPoint>,
}

async fn handler(State(state): State<AppState>) -> Result<Json<DashboardResponse>, AppError> {
    // ---
    info!("GET /dashboard");
    let config = &state.config;

    let settings = store::load_settings(&state.pool).await?;
    let latest = state.telemetry.latest().await?;
    let history = state
        .telemetry
        .history(config.dashboard_history_limit)
        .await?;

    let status = match latest {
        Some(reading) => LiveStatus::from_reading(
            &reading,
            Utc::now(),
            config.online_window_secs,
            &settings,
            &config.display_offset,
        ),
        None => {
            debug!("No realtime reading available yet");
            LiveStatus::offline()
        }
    };

    if status.alerts.any() {
        warn!("Threshold breached: {:?}", status.alerts);
    }

    let readings: Vec<_> = history.into_iter().map(|(_, reading)| reading).collect();

    Ok(Json(DashboardResponse {
        status,
        history: trend(&readings, &config.display_offset),
    }))
}
