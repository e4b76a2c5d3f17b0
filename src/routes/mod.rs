//! HTTP gateway: merges every subrouter and owns the shared application state.
//!
//! Handlers only marshal; all computation lives in the pipeline and the
//! analytics engine.

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use serde_json::json;

use crate::analytics::AnalyticsEngine;
use crate::error::Error;
use crate::pipeline::EtlPipeline;
use crate::repository::ReadingRepository;
use crate::Config;

mod analytics;
mod health;
mod ingest;
mod readings;

// ---

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub config: Arc<Config>,
    pub repository: Arc<dyn ReadingRepository>,
    pub pipeline: Arc<EtlPipeline>,
    pub analytics: AnalyticsEngine,
    pub http: reqwest::Client,
}

impl AppState {
    // ---
    /// Wire the pipeline and analytics engine onto one repository.
    pub fn new(config: Config, repository: Arc<dyn ReadingRepository>) -> Self {
        // ---
        let pipeline = EtlPipeline::new(repository.clone())
            .with_weights(config.scoring)
            .with_history_limit(config.outlier_sample_size);

        Self {
            analytics: AnalyticsEngine::new(repository.clone()),
            pipeline: Arc::new(pipeline),
            repository,
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(ingest::router())
        .merge(readings::router())
        .merge(analytics::router())
        .merge(health::router())
        .with_state(state)
}

// ---

/// Maps core errors onto HTTP responses.
pub(crate) struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        // ---
        let status = match &self.0 {
            Error::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Storage(_) | Error::StorageUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if self.0.is_parameter_error() {
            tracing::debug!("request rejected: {}", self.0);
        } else {
            tracing::error!("request failed: {}", self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
