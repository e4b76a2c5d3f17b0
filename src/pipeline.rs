//! ETL pipeline: Extract → Validate → DetectOutliers → Enrich → Score → Load.
//!
//! Every stage runs regardless of earlier results; invalid readings are
//! stored with their diagnostics rather than dropped. A fault inside a stage
//! becomes the `processing_error` validation code. Only the storage
//! collaborator's own failures abort an invocation, and an aborted invocation
//! leaves the counters untouched.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::enricher;
use crate::error::Result;
use crate::models::{EnrichedReading, RawReading, StoredReading};
use crate::outlier::{self, HistorySample};
use crate::repository::{ReadingFilter, ReadingRepository};
use crate::scorer::ScoringWeights;
use crate::validator::{self, codes};

/// Default number of recent records used as the outlier history sample.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

// ---

/// Session counters for one pipeline instance. Not durable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub processed: u64,
    pub valid: u64,
    pub invalid: u64,
    pub outliers: u64,
}

impl PipelineStats {
    // ---
    /// Share of processed readings that were valid, in percent.
    pub fn success_rate(&self) -> f64 {
        percent(self.valid, self.processed)
    }

    /// Share of processed readings with at least one outlier flag, in percent.
    pub fn outlier_rate(&self) -> f64 {
        percent(self.outliers, self.processed)
    }

    fn record(&mut self, reading: &EnrichedReading) {
        // ---
        self.processed += 1;
        if reading.is_valid() {
            self.valid += 1;
        } else {
            self.invalid += 1;
        }
        if reading.outliers.any() {
            self.outliers += 1;
        }
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Counters plus derived rates, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineStatsReport {
    #[serde(flatten)]
    pub counters: PipelineStats,
    pub success_rate: f64,
    pub outlier_rate: f64,
}

impl From<PipelineStats> for PipelineStatsReport {
    fn from(counters: PipelineStats) -> Self {
        Self {
            counters,
            success_rate: counters.success_rate(),
            outlier_rate: counters.outlier_rate(),
        }
    }
}

// ---

/// Transforms raw readings into enriched, scored records and loads them.
pub struct EtlPipeline {
    // ---
    repository: Arc<dyn ReadingRepository>,
    weights: ScoringWeights,
    history_limit: usize,
    stats: Mutex<PipelineStats>,
}

impl EtlPipeline {
    // ---
    pub fn new(repository: Arc<dyn ReadingRepository>) -> Self {
        Self {
            repository,
            weights: ScoringWeights::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            stats: Mutex::new(PipelineStats::default()),
        }
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    /// Run one reading through every stage and store the result.
    ///
    /// Errors only when the storage collaborator fails (history query or
    /// save); in that case no counter is incremented.
    pub async fn run(&self, raw: RawReading) -> Result<StoredReading> {
        // ---
        // Extract
        let device_id = raw.device_id().to_string();
        let recorded_at = raw.recorded_at.unwrap_or_else(Utc::now);
        debug!("extracted reading from {} recorded at {}", device_id, recorded_at);

        // Validate
        let mut validation = validator::validate(&raw);

        // DetectOutliers: history is read before this reading is written, so
        // a reading never takes part in its own classification.
        let history_filter = ReadingFilter::all()
            .for_device(device_id.clone())
            .most_recent(self.history_limit);
        let history = self.repository.query(&history_filter).await?;
        let sample = HistorySample::from_records(&history);
        let outliers = outlier::detect(&raw, &sample);

        if outliers.is_temperature_outlier {
            warn!("temperature outlier from {}: {}°C", device_id, raw.temperature());
        }
        if outliers.is_humidity_outlier {
            warn!("humidity outlier from {}: {}%", device_id, raw.humidity());
        }

        // Enrich
        let (heat_index, dew_point, comfort_level) =
            match enricher::enrich(raw.temperature(), raw.humidity()) {
                Ok(e) => (Some(e.heat_index), e.dew_point, Some(e.comfort_level)),
                Err(fault) => {
                    warn!("enrichment failed for {}: {}", device_id, fault);
                    validation.add_error(codes::PROCESSING_ERROR);
                    (None, None, None)
                }
            };

        // Score
        let data_quality_score = self.weights.score(&validation, &outliers);

        if !validation.is_valid {
            warn!("invalid reading from {}: {:?}", device_id, validation.errors);
        }

        let enriched = EnrichedReading {
            device_id,
            temperature: raw.temperature(),
            humidity: raw.humidity(),
            recorded_at,
            processed_at: Utc::now(),
            heat_index,
            dew_point,
            comfort_level,
            data_quality_score,
            outliers,
            validation,
        };

        // Load
        let id = self.repository.save(&enriched).await?;

        self.lock_stats().record(&enriched);

        info!(
            "pipeline stored {} for {} (score {:.1}, valid {})",
            id,
            enriched.device_id,
            enriched.data_quality_score,
            enriched.is_valid()
        );

        Ok(StoredReading {
            id,
            reading: enriched,
        })
    }

    /// Extract a reading from an untyped payload and run it.
    pub async fn run_payload(&self, payload: &Value) -> Result<StoredReading> {
        self.run(RawReading::from_payload(payload)).await
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> PipelineStats {
        *self.lock_stats()
    }

    pub fn reset_stats(&self) {
        *self.lock_stats() = PipelineStats::default();
    }

    // Counters stay meaningful even if a holder panicked mid-update
    fn lock_stats(&self) -> std::sync::MutexGuard<'_, PipelineStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
