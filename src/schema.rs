//! Database schema management for `sensorflow-quality`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call) when
//! the Postgres backend is selected.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `sensor_readings` table holding enriched readings together
/// with their validation and outlier metadata. Invalid readings are stored
/// too, so no column is gated on validity. Safe to call on every startup.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id                     UUID             PRIMARY KEY,
            device_id              TEXT             NOT NULL,
            temperature            DOUBLE PRECISION NOT NULL,
            humidity               DOUBLE PRECISION NOT NULL,
            recorded_at            TIMESTAMPTZ      NOT NULL,
            processed_at           TIMESTAMPTZ      NOT NULL,
            heat_index             DOUBLE PRECISION,
            dew_point              DOUBLE PRECISION,
            comfort_level          TEXT,
            data_quality_score     DOUBLE PRECISION NOT NULL,
            is_temperature_outlier BOOLEAN          NOT NULL DEFAULT FALSE,
            is_humidity_outlier    BOOLEAN          NOT NULL DEFAULT FALSE,
            is_valid               BOOLEAN          NOT NULL,
            validation_errors      TEXT[]           NOT NULL DEFAULT '{}',
            validation_warnings    TEXT[]           NOT NULL DEFAULT '{}'
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Window scans for analytics and recent-history lookups
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_recorded_at
            ON sensor_readings (recorded_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_device_recorded
            ON sensor_readings (device_id, recorded_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
