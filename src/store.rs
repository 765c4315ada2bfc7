//! PostgreSQL persistence for the agrowaste ledger and calibration settings.

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::feed::SnapshotFeed;
use crate::ledger::{check_consume, LedgerView, NewTransaction, StockMapping};
use crate::models::{Action, Settings, TransactionRecord, TransactionRow, LEDGER_USER};

// ---

/// Load the whole ledger in creation order; pending rows sort last.
pub async fn list_transactions(pool: &PgPool) -> Result<Vec<TransactionRecord>, sqlx::Error> {
    // ---
    let rows: Vec<TransactionRow> = sqlx::query_as(
        r#"
        SELECT id, action, material_type, quantity, created_at, created_by
        FROM agrowaste_transactions
        ORDER BY created_at ASC NULLS LAST, id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let records = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id;
            match TransactionRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping ledger row {}: {}", id, e);
                    None
                }
            }
        })
        .collect::<Vec<_>>();

    debug!("Loaded {} ledger transactions", records.len());
    Ok(records)
}

/// Persist a validated transaction.
///
/// A Consume is re-checked against the stored ledger while holding a table
/// lock, so two concurrent consumers cannot both pass on the same stock.
pub async fn insert_transaction(
    pool: &PgPool,
    new: &NewTransaction,
) -> Result<TransactionRecord, AppError> {
    // ---
    let mut tx = pool.begin().await?;

    if new.action == Action::Consume {
        sqlx::query("LOCK TABLE agrowaste_transactions IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let available: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(CASE WHEN action = 'Add' THEN quantity ELSE -quantity END), 0)
            FROM agrowaste_transactions
            WHERE material_type = $1
            "#,
        )
        .bind(&new.material_type)
        .fetch_one(&mut *tx)
        .await?;

        let stored = StockMapping::from([(new.material_type.clone(), available)]);
        check_consume(&stored, new)?;
    }

    let row: TransactionRow = sqlx::query_as(
        r#"
        INSERT INTO agrowaste_transactions (id, action, material_type, quantity, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, action, material_type, quantity, created_at, created_by
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.action.as_str())
    .bind(&new.material_type)
    .bind(new.quantity)
    .bind(LEDGER_USER)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let record = TransactionRecord::try_from(row).map_err(AppError::Validation)?;
    info!(
        "Recorded {} {}kg of {} ({})",
        record.action, record.quantity, record.material_type, record.id
    );
    Ok(record)
}

/// Hard-delete a transaction by id.
pub async fn delete_transaction(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    // ---
    let result = sqlx::query("DELETE FROM agrowaste_transactions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("transaction {}", id)));
    }
    info!("Deleted ledger transaction {}", id);
    Ok(())
}

/// Rebuild the ledger view from storage and publish it to `feed`.
pub async fn publish_ledger(
    pool: &PgPool,
    feed: &SnapshotFeed<LedgerView>,
    recent_limit: usize,
) -> Result<Arc<LedgerView>, sqlx::Error> {
    // ---
    let records = list_transactions(pool).await?;
    feed.publish(LedgerView::from_records(&records, recent_limit));
    Ok(feed.current())
}

// ---

/// Read the calibration settings, storing the defaults on first use.
pub async fn load_settings(pool: &PgPool) -> Result<Settings, sqlx::Error> {
    // ---
    let existing: Option<Settings> = sqlx::query_as(
        r#"
        SELECT max_temp, min_level, max_level, min_power_kw,
               alert_gas_ppm, system_mode, notifications_enabled
        FROM system_settings
        WHERE id = 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    match existing {
        Some(settings) => Ok(settings),
        None => {
            info!("No calibration settings stored, writing defaults");
            let defaults = Settings::default();
            save_settings(pool, &defaults).await?;
            Ok(defaults)
        }
    }
}

/// Replace the stored calibration settings.
pub async fn save_settings(pool: &PgPool, settings: &Settings) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO system_settings (
            id, max_temp, min_level, max_level, min_power_kw,
            alert_gas_ppm, system_mode, notifications_enabled
        ) VALUES (1, $1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            max_temp = EXCLUDED.max_temp,
            min_level = EXCLUDED.min_level,
            max_level = EXCLUDED.max_level,
            min_power_kw = EXCLUDED.min_power_kw,
            alert_gas_ppm = EXCLUDED.alert_gas_ppm,
            system_mode = EXCLUDED.system_mode,
            notifications_enabled = EXCLUDED.notifications_enabled
        "#,
    )
    .bind(settings.max_temp)
    .bind(settings.min_level)
    .bind(settings.max_level)
    .bind(settings.min_power_kw)
    .bind(settings.alert_gas_ppm)
    .bind(&settings.system_mode)
    .bind(settings.notifications_enabled)
    .execute(pool)
    .await?;

    Ok(())
}
