// src/routes/health.rs
//! API health check endpoint for the sensorflow-quality service.
//!
//! This module defines the `/health` route used by container orchestrators
//! and CI pipelines to verify that the service is running. It is a sibling
//! module in the `routes` directory and follows the Explicit Module Boundary
//! Pattern (EMBP):
//! - Internal to this file: endpoint handler(s) and related types
//! - Exports to the gateway (`mod.rs`): a subrouter containing the `/health` route

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;
use crate::config::StorageBackend;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    storage: &'static str,
    readings_processed: u64,
}

/// Handle `GET /health`.
///
/// Reports liveness, the configured storage backend and the session's
/// processed count. Does not touch the storage collaborator.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    // ---
    let storage = match state.config.storage_backend {
        StorageBackend::Postgres => "postgres",
        StorageBackend::Memory => "memory",
    };

    Json(HealthResponse {
        status: "ok",
        storage,
        readings_processed: state.pipeline.stats().processed,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
