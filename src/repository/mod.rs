//! Storage collaborator contract and its backends.
//!
//! The pipeline and the analytics engine only ever see
//! `Arc<dyn ReadingRepository>`; which backend sits behind it is decided once
//! at startup from configuration.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{EnrichedReading, StoredReading};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

// ---

/// Persistence for enriched readings.
#[async_trait]
pub trait ReadingRepository: Send + Sync {
    /// Persist one reading and return its id. Must fail, never drop silently.
    async fn save(&self, reading: &EnrichedReading) -> Result<Uuid>;

    /// Readings matching `filter`, ascending by `recorded_at`.
    async fn query(&self, filter: &ReadingFilter) -> Result<Vec<StoredReading>>;

    /// Whole-store quality figures, with readings at or after `recent_since`
    /// counted as recent and at most `top_errors` error codes ranked.
    ///
    /// The default folds over a full [`query`](Self::query); backends that can
    /// aggregate in place override it.
    async fn quality_aggregates(
        &self,
        recent_since: DateTime<Utc>,
        top_errors: usize,
    ) -> Result<QualityAggregates> {
        // ---
        let records = self.query(&ReadingFilter::all()).await?;
        Ok(QualityAggregates::from_readings(
            records.iter().map(|r| &r.reading),
            recent_since,
            top_errors,
        ))
    }
}

/// Counts and score extremes over every stored reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityAggregates {
    // ---
    pub total_readings: usize,
    pub recent_readings: usize,
    pub average_score: Option<f64>,
    pub minimum_score: Option<f64>,
    pub maximum_score: Option<f64>,
    pub invalid_records: usize,
    pub temperature_outliers: usize,
    pub humidity_outliers: usize,
    /// Error codes on invalid records, count descending then code ascending.
    pub top_errors: Vec<(String, usize)>,
}

impl QualityAggregates {
    // ---
    /// Fold readings in one pass.
    pub fn from_readings<'a>(
        readings: impl IntoIterator<Item = &'a EnrichedReading>,
        recent_since: DateTime<Utc>,
        top_errors: usize,
    ) -> Self {
        // ---
        let mut agg = Self::default();
        let mut score_sum = 0.0;
        let mut scored = 0usize;
        let mut frequency: HashMap<&str, usize> = HashMap::new();

        for r in readings {
            agg.total_readings += 1;
            if r.recorded_at >= recent_since {
                agg.recent_readings += 1;
            }
            let s = r.data_quality_score;
            if s.is_finite() {
                scored += 1;
                score_sum += s;
                agg.minimum_score = Some(agg.minimum_score.map_or(s, |m| m.min(s)));
                agg.maximum_score = Some(agg.maximum_score.map_or(s, |m| m.max(s)));
            }
            if !r.is_valid() {
                agg.invalid_records += 1;
                for code in &r.validation.errors {
                    *frequency.entry(code.as_str()).or_default() += 1;
                }
            }
            agg.temperature_outliers += usize::from(r.outliers.is_temperature_outlier);
            agg.humidity_outliers += usize::from(r.outliers.is_humidity_outlier);
        }

        agg.average_score = (scored > 0).then(|| score_sum / scored as f64);

        let mut ranked: Vec<(String, usize)> = frequency
            .into_iter()
            .map(|(code, count)| (code.to_string(), count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(top_errors);
        agg.top_errors = ranked;

        agg
    }
}

/// Selection of stored readings. All bounds are inclusive; `None` means
/// unbounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingFilter {
    // ---
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub device_id: Option<String>,
    /// Keep only the most recent `limit` matches (still returned ascending).
    pub limit: Option<usize>,
}

impl ReadingFilter {
    // ---
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            until: Some(until),
            ..Self::default()
        }
    }

    pub fn for_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn most_recent(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a reading satisfies the time and device constraints
    /// (`limit` is applied by the backend).
    pub fn matches(&self, reading: &EnrichedReading) -> bool {
        // ---
        self.since.map_or(true, |since| reading.recorded_at >= since)
            && self.until.map_or(true, |until| reading.recorded_at <= until)
            && self
                .device_id
                .as_ref()
                .map_or(true, |id| &reading.device_id == id)
    }
}
