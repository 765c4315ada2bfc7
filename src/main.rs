//! Application entry point for the `ecovolt-monitor` backend service.
//!
//! This binary orchestrates the full startup sequence for the EcoVolt
//! biomass monitoring API, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool for the agrowaste ledger
//! - Creating the database schema if it does not exist
//! - Publishing the initial ledger snapshot and logging later ones
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `TELEMETRY_URL` (**required**) – realtime telemetry database URL
//! - `ECOVOLT_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `ECOVOLT_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the full list. This module follows the Explicit Module
//! Boundary Pattern (EMBP) by delegating schema setup to `schema`,
//! configuration parsing to `config`, and route registration to `routes`.
use std::{env, net::SocketAddr, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod config;
mod error;
mod feed;
mod ledger;
mod live;
mod models;
mod report;
mod routes;
mod schema;
mod store;
mod telemetry;

pub use config::Config;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to ledger database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    let ledger = feed::SnapshotFeed::new(ledger::LedgerView::default());
    let view = store::publish_ledger(&pool, &ledger, cfg.ledger_recent_limit as usize).await?;
    tracing::info!(
        "Ledger loaded: {} transactions, {} materials",
        view.transaction_count,
        view.stock.len()
    );
    tokio::spawn(log_ledger_changes(ledger.subscribe()));

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    let state = routes::AppState {
        pool: pool.clone(),
        telemetry: telemetry::TelemetryClient::new(
            cfg.telemetry_url.clone(),
            cfg.telemetry_auth.clone(),
        ),
        ledger,
        config: cfg,
    };

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Log every ledger snapshot published after startup, with its lowest stock.
async fn log_ledger_changes(mut rx: watch::Receiver<Arc<ledger::LedgerView>>) {
    // ---
    while rx.changed().await.is_ok() {
        let view = Arc::clone(&rx.borrow_and_update());
        match &view.lowest {
            Some(ledger::LowestStock::Material { material, stock }) => tracing::info!(
                "Ledger updated: {} transactions, lowest stock {} at {}kg",
                view.transaction_count,
                material,
                stock
            ),
            _ => tracing::info!(
                "Ledger updated: {} transactions, no stock on hand",
                view.transaction_count
            ),
        }
    }
    tracing::debug!("Ledger feed closed");
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `ECOVOLT_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, falling back to `ECOVOLT_LOG_LEVEL`
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("ECOVOLT_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("ECOVOLT_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
