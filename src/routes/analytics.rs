//! Analytics endpoints; thin wrappers over [`AnalyticsEngine`](crate::analytics::AnalyticsEngine).

use axum::{extract::Query, extract::State, routing::get, Json, Router};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::analytics::{Dashboard, DataQualityReport, Summary, TrendReport};
use crate::models::Timeframe;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/analytics/summary", get(summary))
        .route("/analytics/trends", get(trends))
        .route("/analytics/data-quality", get(data_quality))
        .route("/analytics/dashboard", get(dashboard))
}

#[derive(Debug, Deserialize)]
struct SummaryQuery {
    timeframe: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrendsQuery {
    days: Option<i64>,
}

/// `GET /analytics/summary?timeframe=24h`
async fn summary(
    Query(params): Query<SummaryQuery>,
    State(state): State<AppState>,
) -> Result<Json<Summary>, ApiError> {
    // ---
    let timeframe: Timeframe = params.timeframe.as_deref().unwrap_or("24h").parse()?;
    Ok(Json(state.analytics.summary(timeframe).await?))
}

/// `GET /analytics/trends?days=7`
async fn trends(
    Query(params): Query<TrendsQuery>,
    State(state): State<AppState>,
) -> Result<Json<TrendReport>, ApiError> {
    Ok(Json(state.analytics.trends(params.days.unwrap_or(7)).await?))
}

/// `GET /analytics/data-quality`
async fn data_quality(State(state): State<AppState>) -> Result<Json<DataQualityReport>, ApiError> {
    Ok(Json(state.analytics.data_quality_report().await?))
}

/// `GET /analytics/dashboard`
async fn dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.analytics.dashboard().await?))
}
