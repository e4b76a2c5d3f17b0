//! IQR-based outlier detection against a recent history sample.
//!
//! Quartiles use linear interpolation between closest ranks
//! (`h = (n - 1) * p`), bounds are `Q1 - 1.5·IQR` and `Q3 + 1.5·IQR`, and a
//! value is an outlier only when strictly outside them. Samples smaller than
//! [`MIN_SAMPLE_SIZE`] never produce an outlier.

use crate::models::{OutlierFlags, RawReading, StoredReading};

/// Fewest prior values needed before anything is classified as an outlier.
pub const MIN_SAMPLE_SIZE: usize = 4;

/// Tukey fence multiplier.
pub const IQR_MULTIPLIER: f64 = 1.5;

// ---

/// Per-metric history values, taken from records stored before the
/// reading under test.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySample {
    // ---
    pub temperatures: Vec<f64>,
    pub humidities: Vec<f64>,
}

impl HistorySample {
    // ---
    /// Build a sample from stored records. Invalid records and non-finite
    /// values are left out so bad data does not widen the fences.
    pub fn from_records(records: &[StoredReading]) -> Self {
        // ---
        let valid = records.iter().map(|r| &r.reading).filter(|r| r.is_valid());

        let mut sample = Self::default();
        for reading in valid {
            if reading.temperature.is_finite() {
                sample.temperatures.push(reading.temperature);
            }
            if reading.humidity.is_finite() {
                sample.humidities.push(reading.humidity);
            }
        }
        sample
    }
}

/// Inclusive outlier fences for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

// ---

/// Classify a reading per metric against its history sample.
pub fn detect(reading: &RawReading, history: &HistorySample) -> OutlierFlags {
    // ---
    OutlierFlags {
        is_temperature_outlier: is_outlier(reading.temperature(), &history.temperatures),
        is_humidity_outlier: is_outlier(reading.humidity(), &history.humidities),
    }
}

/// True iff `value` falls strictly outside the IQR fences of `sample`.
///
/// A degenerate sample (`IQR == 0`) flags every value that differs from the
/// quartile value. Non-finite candidates are never flagged; the validator
/// reports those.
pub fn is_outlier(value: f64, sample: &[f64]) -> bool {
    // ---
    if !value.is_finite() {
        return false;
    }

    let Some(bounds) = iqr_bounds(sample) else {
        return false;
    };

    if bounds.iqr() == 0.0 {
        return value != bounds.q1;
    }

    value < bounds.lower || value > bounds.upper
}

/// Compute quartiles and fences, or `None` when the sample is too small.
pub fn iqr_bounds(sample: &[f64]) -> Option<IqrBounds> {
    // ---
    if sample.len() < MIN_SAMPLE_SIZE {
        return None;
    }

    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let q1 = percentile(&sorted, 0.25);
    let q3 = percentile(&sorted, 0.75);
    let iqr = q3 - q1;

    Some(IqrBounds {
        q1,
        q3,
        lower: q1 - IQR_MULTIPLIER * iqr,
        upper: q3 + IQR_MULTIPLIER * iqr,
    })
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    // ---
    let rank = (sorted.len() - 1) as f64 * p;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;

    sorted[lo] + weight * (sorted[hi] - sorted[lo])
}
