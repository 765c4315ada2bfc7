//! HTTP gateway: merges the per-view subrouters and owns the shared state.

use axum::Router;
use sqlx::PgPool;

use crate::feed::SnapshotFeed;
use crate::ledger::LedgerView;
use crate::telemetry::TelemetryClient;
use crate::Config;

mod agrowaste;
mod dashboard;
mod health;
mod reports;
mod settings;

// ---

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub telemetry: TelemetryClient,
    pub ledger: SnapshotFeed<LedgerView>,
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(dashboard::router())
        .merge(agrowaste::router())
        .merge(reports::router())
        .merge(settings::router())
        .merge(health::router())
        .with_state(state)
}
