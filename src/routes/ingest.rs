//! ETL endpoints: ingest one reading, pipeline statistics, upstream sync.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, routing::post, Json,
    Router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::models::StoredReading;
use crate::pipeline::PipelineStatsReport;
use crate::upstream;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/etl/readings", post(ingest))
        .route("/etl/stats", get(stats))
        .route("/etl/stats/reset", post(reset_stats))
        .route("/etl/sync", post(sync))
}

#[derive(Debug, Serialize)]
struct OutliersDetected {
    temperature: bool,
    humidity: bool,
}

#[derive(Debug, Serialize)]
struct ProcessedFields {
    heat_index: bool,
    dew_point: bool,
    comfort_level: bool,
}

/// Result of ingesting one reading.
#[derive(Debug, Serialize)]
struct PipelineOutcome {
    id: Uuid,
    data_quality_score: f64,
    is_valid: bool,
    outliers_detected: OutliersDetected,
    processed_fields: ProcessedFields,
    reading: StoredReading,
}

impl From<StoredReading> for PipelineOutcome {
    fn from(stored: StoredReading) -> Self {
        // ---
        let r = &stored.reading;
        Self {
            id: stored.id,
            data_quality_score: r.data_quality_score,
            is_valid: r.is_valid(),
            outliers_detected: OutliersDetected {
                temperature: r.outliers.is_temperature_outlier,
                humidity: r.outliers.is_humidity_outlier,
            },
            processed_fields: ProcessedFields {
                heat_index: r.heat_index.is_some(),
                dew_point: r.dew_point.is_some(),
                comfort_level: r.comfort_level.is_some(),
            },
            reading: stored,
        }
    }
}

/// `POST /etl/readings`: body is any JSON object; malformed fields are
/// recorded as validation errors, not rejected.
async fn ingest(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    debug!("POST /etl/readings - {}", payload);
    let stored = state.pipeline.run_payload(&payload).await?;
    Ok((StatusCode::CREATED, Json(PipelineOutcome::from(stored))))
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    note: &'static str,
    stats: PipelineStatsReport,
}

/// `GET /etl/stats`
async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        note: "Session statistics; reset on restart or via POST /etl/stats/reset",
        stats: state.pipeline.stats().into(),
    })
}

/// `POST /etl/stats/reset`
async fn reset_stats(State(state): State<AppState>) -> StatusCode {
    // ---
    state.pipeline.reset_stats();
    info!("pipeline statistics reset");
    StatusCode::NO_CONTENT
}

/// `POST /etl/sync`: pull the upstream sensor API through the pipeline.
async fn sync(State(state): State<AppState>) -> Result<axum::response::Response, ApiError> {
    // ---
    let Some(api_url) = state.config.api_url.as_deref() else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "SENSOR_API_URL is not configured" })),
        )
            .into_response());
    };

    info!("POST /etl/sync - pulling from {}", api_url);
    let report = upstream::sync(&state.pipeline, &state.http, api_url, state.config.api_max_pages).await?;
    Ok((StatusCode::OK, Json(report)).into_response())
}
