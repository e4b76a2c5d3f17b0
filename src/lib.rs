//! ETL quality engine and analytics for temperature/humidity sensor telemetry.
//!
//! Each incoming reading flows through
//! `validator` → `outlier` → `enricher` → `scorer` → storage, driven by
//! [`EtlPipeline`]. [`AnalyticsEngine`] answers read-only questions over the
//! stored readings. The `routes` module exposes both over HTTP.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): sibling
//! modules depend on the types re-exported here rather than on each other's
//! internals wherever practical.

pub mod analytics;
pub mod config;
pub mod enricher;
pub mod error;
pub mod models;
pub mod outlier;
pub mod pipeline;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod scorer;
pub mod upstream;
pub mod validator;

pub use analytics::AnalyticsEngine;
pub use config::{Config, StorageBackend};
pub use error::{Error, ProcessingFault, Result};
pub use models::{
    ComfortLevel, EnrichedReading, FieldValue, OutlierFlags, RawReading, StoredReading, Timeframe,
    TrendDirection, TrendResult, ValidationResult,
};
pub use pipeline::{EtlPipeline, PipelineStats, PipelineStatsReport};
pub use repository::{
    MemoryRepository, PgRepository, QualityAggregates, ReadingFilter, ReadingRepository,
};
pub use routes::{router, AppState};
pub use scorer::ScoringWeights;
