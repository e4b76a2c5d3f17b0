//! Read-back of stored readings.

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::repository::ReadingFilter;

/// Default and maximum page size for `/readings/history`.
const DEFAULT_HISTORY_LIMIT: usize = 100;
const MAX_HISTORY_LIMIT: usize = 1000;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/readings/latest", get(latest))
        .route("/readings/history", get(history))
}

/// Query parameters for filtering stored readings
#[derive(Debug, Deserialize)]
struct ReadingsQuery {
    device_id: Option<String>,
    limit: Option<usize>,
}

impl ReadingsQuery {
    fn to_filter(&self, default_limit: usize) -> ReadingFilter {
        // ---
        let limit = self.limit.unwrap_or(default_limit).min(MAX_HISTORY_LIMIT);
        let filter = ReadingFilter::all().most_recent(limit);
        match &self.device_id {
            Some(id) => filter.for_device(id.clone()),
            None => filter,
        }
    }
}

/// `GET /readings/latest?device_id=`
async fn latest(
    Query(params): Query<ReadingsQuery>,
    State(state): State<AppState>,
) -> Result<axum::response::Response, ApiError> {
    // ---
    let mut readings = state.repository.query(&params.to_filter(1)).await?;
    Ok(match readings.pop() {
        Some(reading) => (StatusCode::OK, Json(reading)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    })
}

/// `GET /readings/history?device_id=&limit=`, newest first.
async fn history(
    Query(params): Query<ReadingsQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    tracing::info!("Apply filter: {:?}", params);
    let mut readings = state
        .repository
        .query(&params.to_filter(DEFAULT_HISTORY_LIMIT))
        .await?;
    readings.reverse();
    Ok(Json(readings))
}
