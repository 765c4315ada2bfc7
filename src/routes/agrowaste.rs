//! Agrowaste (feedstock) ledger endpoints.
//!
//! Reads are served from the published ledger snapshot. Writes validate
//! against that snapshot first, then against the stored ledger inside the
//! insert transaction, and republish on success.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::AppState;
use crate::error::AppError;
use crate::ledger::{check_consume, LedgerView, NewTransaction};
use crate::models::{TransactionForm, TransactionRecord};
use crate::store;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/agrowaste", get(view))
        .route("/agrowaste/transactions", post(create))
        .route("/agrowaste/transactions/{id}", delete(remove))
}

async fn view(State(state): State<AppState>) -> Json<LedgerView> {
    Json(state.ledger.current().as_ref().clone())
}

async fn create(
    State(state): State<AppState>,
    Json(form): Json<TransactionForm>,
) -> Result<(StatusCode, Json<TransactionRecord>), AppError> {
    // ---
    info!("POST /agrowaste/transactions - {} {}", form.action, form.material_type.trim());

    let new = NewTransaction::parse(form)?;
    check_consume(&state.ledger.current().stock, &new)?;

    let record = store::insert_transaction(&state.pool, &new).await?;
    refresh(&state).await;

    Ok((StatusCode::CREATED, Json(record)))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    // ---
    info!("DELETE /agrowaste/transactions/{}", id);

    store::delete_transaction(&state.pool, id).await?;
    refresh(&state).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Republish the ledger after a write.
///
/// The write already succeeded, so a failed reload only leaves the previous
/// snapshot in place until the next change.
async fn refresh(state: &AppState) {
    // ---
    let recent_limit = state.config.ledger_recent_limit as usize;
    if let Err(e) = store::publish_ledger(&state.pool, &state.ledger, recent_limit).await {
        warn!("Failed to republish ledger snapshot: {}", e);
    }
}
