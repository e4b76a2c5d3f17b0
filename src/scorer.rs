//! Composite 0–100 data quality score.
//!
//! Starts at 100 and subtracts a fixed penalty per validation error, per
//! detected outlier and per warning, then clamps to `[0, 100]`. Penalty
//! classes must stay ordered errors > outliers > warnings.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{OutlierFlags, ValidationResult};

pub const MAX_SCORE: f64 = 100.0;

/// Penalty weights for each class of quality issue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringWeights {
    // ---
    pub error_penalty: f64,
    pub outlier_penalty: f64,
    pub warning_penalty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            error_penalty: 30.0,
            outlier_penalty: 10.0,
            warning_penalty: 5.0,
        }
    }
}

impl ScoringWeights {
    // ---
    /// Build weights, rejecting negative penalties or a broken class ordering.
    pub fn new(error_penalty: f64, outlier_penalty: f64, warning_penalty: f64) -> Result<Self> {
        // ---
        let weights = Self {
            error_penalty,
            outlier_penalty,
            warning_penalty,
        };

        if [error_penalty, outlier_penalty, warning_penalty]
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(invalid_weights(format!(
                "penalties must be finite and non-negative: {weights:?}"
            )));
        }
        if !(error_penalty > outlier_penalty && outlier_penalty > warning_penalty) {
            return Err(invalid_weights(format!(
                "penalties must be ordered errors > outliers > warnings: {weights:?}"
            )));
        }

        Ok(weights)
    }

    /// Score one reading's validation and outlier results.
    pub fn score(&self, validation: &ValidationResult, outliers: &OutlierFlags) -> f64 {
        // ---
        let penalty = validation.errors.len() as f64 * self.error_penalty
            + outliers.count() as f64 * self.outlier_penalty
            + validation.warnings.len() as f64 * self.warning_penalty;

        (MAX_SCORE - penalty).clamp(0.0, MAX_SCORE)
    }
}

fn invalid_weights(message: String) -> Error {
    Error::InvalidParameter {
        name: "scoring weights",
        message,
    }
}

/// Score with the default weights.
pub fn score(validation: &ValidationResult, outliers: &OutlierFlags) -> f64 {
    ScoringWeights::default().score(validation, outliers)
}
