//! Database schema management for `ecovolt-monitor`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `agrowaste_transactions` ledger table and the single-row
/// `system_settings` table. Safe to call on every startup; no-op if objects
/// already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Append-only feedstock ledger; rows are inserted or deleted, never updated
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agrowaste_transactions (
            id            UUID        PRIMARY KEY,
            action        TEXT        NOT NULL CHECK (action IN ('Add', 'Consume')),
            material_type TEXT        NOT NULL,
            quantity      NUMERIC     NOT NULL CHECK (quantity > 0),
            created_at    TIMESTAMPTZ DEFAULT now(),
            created_by    TEXT        NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Calibration thresholds; the CHECK keeps it to one row
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS system_settings (
            id                    SMALLINT         PRIMARY KEY DEFAULT 1 CHECK (id = 1),
            max_temp              DOUBLE PRECISION NOT NULL,
            min_level             DOUBLE PRECISION NOT NULL,
            max_level             DOUBLE PRECISION NOT NULL,
            min_power_kw          DOUBLE PRECISION NOT NULL,
            alert_gas_ppm         BIGINT           NOT NULL,
            system_mode           TEXT             NOT NULL,
            notifications_enabled BOOLEAN          NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_agrowaste_transactions_created_at
            ON agrowaste_transactions (created_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_agrowaste_transactions_material
            ON agrowaste_transactions (material_type);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
