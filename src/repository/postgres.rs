//! PostgreSQL storage backend over the `sensor_readings` table.
//!
//! The table is created by [`crate::schema::create_schema`] at startup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{QualityAggregates, ReadingFilter, ReadingRepository};
use crate::error::{Error, Result};
use crate::models::{ComfortLevel, EnrichedReading, OutlierFlags, StoredReading, ValidationResult};

// ---

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row shape of `sensor_readings`.
#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    // ---
    id: Uuid,
    device_id: String,
    temperature: f64,
    humidity: f64,
    recorded_at: DateTime<Utc>,
    processed_at: DateTime<Utc>,
    heat_index: Option<f64>,
    dew_point: Option<f64>,
    comfort_level: Option<String>,
    data_quality_score: f64,
    is_temperature_outlier: bool,
    is_humidity_outlier: bool,
    is_valid: bool,
    validation_errors: Vec<String>,
    validation_warnings: Vec<String>,
}

/// Single-row result of the whole-table quality aggregation.
#[derive(Debug, sqlx::FromRow)]
struct QualityRow {
    total_readings: i64,
    recent_readings: i64,
    average_score: Option<f64>,
    minimum_score: Option<f64>,
    maximum_score: Option<f64>,
    invalid_records: i64,
    temperature_outliers: i64,
    humidity_outliers: i64,
}

fn to_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or_default()
}

impl TryFrom<ReadingRow> for StoredReading {
    type Error = Error;

    fn try_from(row: ReadingRow) -> Result<Self> {
        // ---
        let comfort_level = row
            .comfort_level
            .as_deref()
            .map(str::parse::<ComfortLevel>)
            .transpose()
            .map_err(|e| Error::Storage(sqlx::Error::Decode(e.into())))?;

        Ok(StoredReading {
            id: row.id,
            reading: EnrichedReading {
                device_id: row.device_id,
                temperature: row.temperature,
                humidity: row.humidity,
                recorded_at: row.recorded_at,
                processed_at: row.processed_at,
                heat_index: row.heat_index,
                dew_point: row.dew_point,
                comfort_level,
                data_quality_score: row.data_quality_score,
                outliers: OutlierFlags {
                    is_temperature_outlier: row.is_temperature_outlier,
                    is_humidity_outlier: row.is_humidity_outlier,
                },
                validation: ValidationResult {
                    is_valid: row.is_valid,
                    errors: row.validation_errors,
                    warnings: row.validation_warnings,
                },
            },
        })
    }
}

#[async_trait]
impl ReadingRepository for PgRepository {
    // ---
    async fn save(&self, reading: &EnrichedReading) -> Result<Uuid> {
        // ---
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO sensor_readings (
                id, device_id, temperature, humidity,
                recorded_at, processed_at,
                heat_index, dew_point, comfort_level, data_quality_score,
                is_temperature_outlier, is_humidity_outlier,
                is_valid, validation_errors, validation_warnings
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(id)
        .bind(&reading.device_id)
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.recorded_at)
        .bind(reading.processed_at)
        .bind(reading.heat_index)
        .bind(reading.dew_point)
        .bind(reading.comfort_level.map(|c| c.as_str()))
        .bind(reading.data_quality_score)
        .bind(reading.outliers.is_temperature_outlier)
        .bind(reading.outliers.is_humidity_outlier)
        .bind(reading.validation.is_valid)
        .bind(&reading.validation.errors)
        .bind(&reading.validation.warnings)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn query(&self, filter: &ReadingFilter) -> Result<Vec<StoredReading>> {
        // ---
        // Newest-first inside so LIMIT keeps the most recent rows, then
        // re-sorted ascending for callers.
        let rows: Vec<ReadingRow> = sqlx::query_as(
            r#"
            SELECT * FROM (
                SELECT
                    id, device_id, temperature, humidity,
                    recorded_at, processed_at,
                    heat_index, dew_point, comfort_level, data_quality_score,
                    is_temperature_outlier, is_humidity_outlier,
                    is_valid, validation_errors, validation_warnings
                FROM sensor_readings
                WHERE ($1::timestamptz IS NULL OR recorded_at >= $1)
                  AND ($2::timestamptz IS NULL OR recorded_at <= $2)
                  AND ($3::text IS NULL OR device_id = $3)
                ORDER BY recorded_at DESC
                LIMIT $4
            ) recent
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(filter.since)
        .bind(filter.until)
        .bind(filter.device_id.as_deref())
        .bind(filter.limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("postgres store: {} rows for {:?}", rows.len(), filter);
        rows.into_iter().map(StoredReading::try_from).collect()
    }

    async fn quality_aggregates(
        &self,
        recent_since: DateTime<Utc>,
        top_errors: usize,
    ) -> Result<QualityAggregates> {
        // ---
        let row: QualityRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*)                                         AS total_readings,
                COUNT(*) FILTER (WHERE recorded_at >= $1)        AS recent_readings,
                AVG(data_quality_score)                          AS average_score,
                MIN(data_quality_score)                          AS minimum_score,
                MAX(data_quality_score)                          AS maximum_score,
                COUNT(*) FILTER (WHERE NOT is_valid)             AS invalid_records,
                COUNT(*) FILTER (WHERE is_temperature_outlier)   AS temperature_outliers,
                COUNT(*) FILTER (WHERE is_humidity_outlier)      AS humidity_outliers
            FROM sensor_readings
            "#,
        )
        .bind(recent_since)
        .fetch_one(&self.pool)
        .await?;

        let top_errors: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT code, COUNT(*) AS occurrences
            FROM sensor_readings, UNNEST(validation_errors) AS code
            WHERE NOT is_valid
            GROUP BY code
            ORDER BY occurrences DESC, code ASC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(top_errors).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("postgres store: quality aggregates over {} rows", row.total_readings);

        Ok(QualityAggregates {
            total_readings: to_count(row.total_readings),
            recent_readings: to_count(row.recent_readings),
            average_score: row.average_score,
            minimum_score: row.minimum_score,
            maximum_score: row.maximum_score,
            invalid_records: to_count(row.invalid_records),
            temperature_outliers: to_count(row.temperature_outliers),
            humidity_outliers: to_count(row.humidity_outliers),
            top_errors: top_errors
                .into_iter()
                .map(|(code, count)| (code, to_count(count)))
                .collect(),
        })
    }
}
