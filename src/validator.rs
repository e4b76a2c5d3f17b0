//! Domain-limit validation of raw readings.
//!
//! Every rule is applied independently and all violations are collected;
//! nothing here short-circuits. Errors invalidate a reading, warnings only
//! annotate it.

use crate::models::{FieldValue, RawReading, ValidationResult};

/// Validation codes as they appear in stored records.
pub mod codes {
    pub const TEMPERATURE_MISSING: &str = "temperature_missing";
    pub const TEMPERATURE_INVALID_TYPE: &str = "temperature_invalid_type";
    pub const TEMPERATURE_OUT_OF_RANGE: &str = "temperature_out_of_range";
    pub const TEMPERATURE_EXTREME: &str = "temperature_extreme";
    pub const HUMIDITY_MISSING: &str = "humidity_missing";
    pub const HUMIDITY_INVALID_TYPE: &str = "humidity_invalid_type";
    pub const HUMIDITY_OUT_OF_RANGE: &str = "humidity_out_of_range";
    pub const HUMIDITY_VERY_HIGH: &str = "humidity_very_high";
    pub const DEVICE_ID_EMPTY: &str = "device_id_empty";
    pub const DEVICE_ID_INVALID_TYPE: &str = "device_id_invalid_type";
    pub const PROCESSING_ERROR: &str = "processing_error";
}

/// Sensor hardware limits, °C.
pub const TEMPERATURE_MIN: f64 = -40.0;
pub const TEMPERATURE_MAX: f64 = 80.0;

/// Soft band, °C. Inside the hard limits but outside this band ⇒ warning.
pub const TEMPERATURE_SOFT_MIN: f64 = -10.0;
pub const TEMPERATURE_SOFT_MAX: f64 = 50.0;

pub const HUMIDITY_MIN: f64 = 0.0;
pub const HUMIDITY_MAX: f64 = 100.0;
pub const HUMIDITY_SOFT_MAX: f64 = 95.0;

// ---

/// Validate a raw reading against domain limits and field rules.
pub fn validate(reading: &RawReading) -> ValidationResult {
    // ---
    let mut result = ValidationResult::valid();

    check_temperature(&reading.temperature, &mut result);
    check_humidity(&reading.humidity, &mut result);

    // an absent device id is allowed and defaults to the sentinel
    match &reading.device_id {
        FieldValue::Missing => {}
        FieldValue::Invalid => result.add_error(codes::DEVICE_ID_INVALID_TYPE),
        FieldValue::Present(id) if id.trim().is_empty() => result.add_error(codes::DEVICE_ID_EMPTY),
        FieldValue::Present(_) => {}
    }

    result
}

fn check_temperature(temperature: &FieldValue<f64>, result: &mut ValidationResult) {
    // ---
    let temperature = match temperature {
        FieldValue::Missing => {
            result.add_error(codes::TEMPERATURE_MISSING);
            return;
        }
        FieldValue::Present(t) if t.is_finite() => *t,
        FieldValue::Present(_) | FieldValue::Invalid => {
            result.add_error(codes::TEMPERATURE_INVALID_TYPE);
            return;
        }
    };

    if !(TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&temperature) {
        result.add_error(codes::TEMPERATURE_OUT_OF_RANGE);
    } else if !(TEMPERATURE_SOFT_MIN..=TEMPERATURE_SOFT_MAX).contains(&temperature) {
        result.add_warning(codes::TEMPERATURE_EXTREME);
    }
}

fn check_humidity(humidity: &FieldValue<f64>, result: &mut ValidationResult) {
    // ---
    let humidity = match humidity {
        FieldValue::Missing => {
            result.add_error(codes::HUMIDITY_MISSING);
            return;
        }
        FieldValue::Present(h) if h.is_finite() => *h,
        FieldValue::Present(_) | FieldValue::Invalid => {
            result.add_error(codes::HUMIDITY_INVALID_TYPE);
            return;
        }
    };

    if !(HUMIDITY_MIN..=HUMIDITY_MAX).contains(&humidity) {
        result.add_error(codes::HUMIDITY_OUT_OF_RANGE);
    } else if humidity > HUMIDITY_SOFT_MAX {
        result.add_warning(codes::HUMIDITY_VERY_HIGH);
    }
}
