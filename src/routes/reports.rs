//! Historical report endpoints: sampled table, averages, export and deletion.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::AppState;
use crate::error::AppError;
use crate::report::{aggregate, export_rows, sample, to_csv, ReportRow, ReportStats};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/reports", get(list).delete(clear))
        .route("/reports/export", get(export))
        .route("/reports/{id}", delete(remove))
}

/// Query parameters shared by the report endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    /// Case-insensitive substring matched against the formatted date.
    #[serde(default)]
    search: String,
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    interval_secs: u32,
    total: usize,
    stats: ReportStats,
    /// Newest first.
    rows: Vec<ReportRow>,
}

/// Pull the report history and sample it, oldest first.
async fn sampled_rows(state: &AppState, search: &str) -> Result<Vec<ReportRow>, AppError> {
    // ---
    let config = &state.config;
    let history = state.telemetry.history(config.report_history_limit).await?;

    let rows: Vec<ReportRow> = history
        .iter()
        .map(|(id, reading)| ReportRow::from_reading(id.as_str(), reading, &config.display_offset))
        .collect();

    let kept = sample(&rows, search, i64::from(config.report_spacing_secs));
    debug!(
        "Report sampling kept {} of {} rows (search: {:?})",
        kept.len(),
        rows.len(),
        search
    );
    Ok(kept)
}

async fn list(
    State(state): State<AppState>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<ReportResponse>, AppError> {
    // ---
    info!("GET /reports");

    let mut rows = sampled_rows(&state, &params.search).await?;
    let stats = aggregate(&rows).rounded();
    rows.reverse();

    Ok(Json(ReportResponse {
        interval_secs: state.config.report_spacing_secs,
        total: rows.len(),
        stats,
        rows,
    }))
}

async fn export(
    State(state): State<AppState>,
    Query(params): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    // ---
    info!("GET /reports/export");

    let mut rows = sampled_rows(&state, &params.search).await?;
    if rows.is_empty() {
        return Err(AppError::Validation("no report data to export".into()));
    }
    rows.reverse();

    let csv = to_csv(&export_rows(&rows))?;
    let filename = format!(
        "attachment; filename=\"EcoVolt_Report_{}.csv\"",
        Utc::now().with_timezone(&state.config.display_offset).format("%Y-%m-%d")
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        csv,
    ))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    // ---
    info!("DELETE /reports/{}", id);

    if id.is_empty() || id.contains(['/', '.', '#', '$', '[', ']']) {
        return Err(AppError::Validation(format!("invalid sensor log id '{}'", id)));
    }

    state.telemetry.delete_log(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Erase every sensor log. Realtime data and the ledger are untouched.
async fn clear(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    // ---
    info!("DELETE /reports");

    state.telemetry.clear_logs().await?;
    warn!("All sensor logs were cleared");
    Ok(StatusCode::NO_CONTENT)
}
