//! Calibration threshold endpoints.

use axum::{extract::State, routing::get, Json, Router};
use tracing::info;

use super::AppState;
use crate::error::AppError;
use crate::models::Settings;
use crate::store;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(read).put(update))
}

async fn read(State(state): State<AppState>) -> Result<Json<Settings>, AppError> {
    Ok(Json(store::load_settings(&state.pool).await?))
}

async fn update(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, AppError> {
    // ---
    settings.validate().map_err(AppError::Validation)?;
    store::save_settings(&state.pool, &settings).await?;

    info!("System thresholds updated: {:?}", settings);
    Ok(Json(settings))
}
