//! Database schema management for `drive-temp-history`.
//!
//! Ensures the temperature table and its index exist before serving requests.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `temp` measurement table written by the sample writer: one
/// row per point, tagged by `device_id`. Safe to call on every startup.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Points are append-only; no primary key so repeated scans are kept as-is
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS temp (
            ts        TIMESTAMPTZ NOT NULL,
            device_id TEXT,
            temp      BIGINT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // History reads group by device and scan forward in time
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_temp_device_id_ts
            ON temp (device_id, ts);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
