//! Data models for the sensor quality pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;

/// Device id recorded when a reading arrives without one.
pub const UNKNOWN_DEVICE: &str = "unknown";

// ---

/// A field as it arrived at the ingestion boundary.
///
/// Absence and an unusable value are kept apart so the validator can report
/// them under different codes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<T> {
    /// Not present in the payload.
    Missing,
    /// Present, but not of a usable type.
    Invalid,
    Present(T),
}

impl<T> FieldValue<T> {
    // ---
    pub fn as_present(&self) -> Option<&T> {
        match self {
            FieldValue::Present(v) => Some(v),
            FieldValue::Missing | FieldValue::Invalid => None,
        }
    }
}

impl FieldValue<f64> {
    /// The number, or `NaN` when missing or invalid.
    pub fn value(&self) -> f64 {
        self.as_present().copied().unwrap_or(f64::NAN)
    }
}

/// Raw sensor reading as received at the ingestion boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    // ---
    /// Air temperature in °C.
    pub temperature: FieldValue<f64>,
    /// Relative humidity in %RH.
    pub humidity: FieldValue<f64>,
    pub device_id: FieldValue<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl RawReading {
    // ---
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature: FieldValue::Present(temperature),
            humidity: FieldValue::Present(humidity),
            device_id: FieldValue::Missing,
            recorded_at: None,
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = FieldValue::Present(device_id.into());
        self
    }

    pub fn with_recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(recorded_at);
        self
    }

    /// Temperature in °C, `NaN` when missing or invalid.
    pub fn temperature(&self) -> f64 {
        self.temperature.value()
    }

    /// Humidity in %RH, `NaN` when missing or invalid.
    pub fn humidity(&self) -> f64 {
        self.humidity.value()
    }

    /// Device id, or [`UNKNOWN_DEVICE`] unless a text id was supplied.
    pub fn device_id(&self) -> &str {
        self.device_id.as_present().map_or(UNKNOWN_DEVICE, String::as_str)
    }

    /// Extract a reading from an untyped JSON payload.
    ///
    /// Numbers and numeric strings are accepted for `temperature` and
    /// `humidity`; any other present value (including `null`) is
    /// [`FieldValue::Invalid`]. A `device_id` that is absent or `null` is
    /// missing, one that is not text is invalid. Nothing is dropped here:
    /// the validator flags whatever could not be read.
    pub fn from_payload(payload: &Value) -> Self {
        // ---
        let device_id = match payload.get("device_id") {
            None | Some(Value::Null) => FieldValue::Missing,
            Some(Value::String(s)) => FieldValue::Present(s.clone()),
            Some(_) => FieldValue::Invalid,
        };

        let recorded_at = payload
            .get("recorded_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Self {
            temperature: numeric_field(payload, "temperature"),
            humidity: numeric_field(payload, "humidity"),
            device_id,
            recorded_at,
        }
    }
}

fn numeric_field(payload: &Value, name: &str) -> FieldValue<f64> {
    // ---
    let parsed = match payload.get(name) {
        None => return FieldValue::Missing,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    parsed.map_or(FieldValue::Invalid, FieldValue::Present)
}

// ---

/// Outcome of validating one raw reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    // ---
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    // ---
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record an error code. Any error makes the result invalid.
    pub fn add_error(&mut self, code: &str) {
        self.errors.push(code.to_string());
        self.is_valid = false;
    }

    pub fn add_warning(&mut self, code: &str) {
        self.warnings.push(code.to_string());
    }
}

/// Per-metric outlier classification of one reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierFlags {
    pub is_temperature_outlier: bool,
    pub is_humidity_outlier: bool,
}

impl OutlierFlags {
    /// Number of metrics flagged.
    pub fn count(&self) -> usize {
        usize::from(self.is_temperature_outlier) + usize::from(self.is_humidity_outlier)
    }

    pub fn any(&self) -> bool {
        self.is_temperature_outlier || self.is_humidity_outlier
    }
}

// ---

/// Thermal comfort classification, ordered from coldest to most oppressive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComfortLevel {
    Cold,
    Mild,
    Comfortable,
    Humid,
    Warm,
    Hot,
    HotHumid,
}

impl ComfortLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComfortLevel::Cold => "cold",
            ComfortLevel::Mild => "mild",
            ComfortLevel::Comfortable => "comfortable",
            ComfortLevel::Humid => "humid",
            ComfortLevel::Warm => "warm",
            ComfortLevel::Hot => "hot",
            ComfortLevel::HotHumid => "hot_humid",
        }
    }
}

impl fmt::Display for ComfortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComfortLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cold" => Ok(ComfortLevel::Cold),
            "mild" => Ok(ComfortLevel::Mild),
            "comfortable" => Ok(ComfortLevel::Comfortable),
            "humid" => Ok(ComfortLevel::Humid),
            "warm" => Ok(ComfortLevel::Warm),
            "hot" => Ok(ComfortLevel::Hot),
            "hot_humid" => Ok(ComfortLevel::HotHumid),
            other => Err(format!("unknown comfort level '{other}'")),
        }
    }
}

// ---

/// A reading after the full transform: raw values plus derived fields and
/// quality metadata. This is the unit handed to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedReading {
    // ---
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub recorded_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub heat_index: Option<f64>,
    pub dew_point: Option<f64>,
    pub comfort_level: Option<ComfortLevel>,
    pub data_quality_score: f64,
    #[serde(flatten)]
    pub outliers: OutlierFlags,
    pub validation: ValidationResult,
}

impl EnrichedReading {
    pub fn is_valid(&self) -> bool {
        self.validation.is_valid
    }
}

/// An enriched reading together with the id storage assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub id: Uuid,
    #[serde(flatten)]
    pub reading: EnrichedReading,
}

// ---

/// Named lookback window for analytics queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl Timeframe {
    // ---
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::OneHour => Duration::hours(1),
            Timeframe::SixHours => Duration::hours(6),
            Timeframe::OneDay => Duration::hours(24),
            Timeframe::SevenDays => Duration::days(7),
            Timeframe::ThirtyDays => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "1h",
            Timeframe::SixHours => "6h",
            Timeframe::OneDay => "24h",
            Timeframe::SevenDays => "7d",
            Timeframe::ThirtyDays => "30d",
        }
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(Timeframe::OneHour),
            "6h" => Ok(Timeframe::SixHours),
            "24h" => Ok(Timeframe::OneDay),
            "7d" => Ok(Timeframe::SevenDays),
            "30d" => Ok(Timeframe::ThirtyDays),
            other => Err(Error::InvalidParameter {
                name: "timeframe",
                message: format!("'{other}' is not one of 1h, 6h, 24h, 7d, 30d"),
            }),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Linear trend of one metric over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    /// Metric units per hour.
    pub slope: f64,
    pub interpretation: String,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_id_defaults_to_sentinel() {
        // ---
        let raw = RawReading::new(21.0, 50.0);
        assert_eq!(raw.device_id(), UNKNOWN_DEVICE);

        let raw = raw.with_device("esp32-kitchen");
        assert_eq!(raw.device_id(), "esp32-kitchen");
    }

    #[test]
    fn test_from_payload_accepts_numbers_and_numeric_strings() {
        // ---
        let raw = RawReading::from_payload(&json!({
            "temperature": 23.5,
            "humidity": "61.25",
            "device_id": "esp32-01",
            "recorded_at": "2025-03-26T18:45:00Z"
        }));

        assert_eq!(raw.temperature(), 23.5);
        assert_eq!(raw.humidity(), 61.25);
        assert_eq!(raw.device_id(), "esp32-01");
        assert!(raw.recorded_at.is_some());
    }

    #[test]
    fn test_from_payload_separates_missing_from_invalid() {
        // ---
        let raw = RawReading::from_payload(&json!({ "temperature": "warm", "humidity": null }));

        assert_eq!(raw.temperature, FieldValue::Invalid);
        assert_eq!(raw.humidity, FieldValue::Invalid);
        assert!(raw.temperature().is_nan());
        assert_eq!(raw.device_id, FieldValue::Missing);
        assert_eq!(raw.recorded_at, None);

        let raw = RawReading::from_payload(&json!({ "humidity": 50.0 }));
        assert_eq!(raw.temperature, FieldValue::Missing);
        assert_eq!(raw.humidity, FieldValue::Present(50.0));
    }

    #[test]
    fn test_from_payload_keeps_non_text_device_id_invalid() {
        // ---
        let raw = RawReading::from_payload(&json!({
            "temperature": 21.0,
            "humidity": 50.0,
            "device_id": 42
        }));
        assert_eq!(raw.device_id, FieldValue::Invalid);
        assert_eq!(raw.device_id(), UNKNOWN_DEVICE);

        let raw = RawReading::from_payload(&json!({ "temperature": 21.0, "device_id": null }));
        assert_eq!(raw.device_id, FieldValue::Missing);

        let raw = RawReading::from_payload(&json!({ "temperature": 21.0, "device_id": "" }));
        assert_eq!(raw.device_id, FieldValue::Present(String::new()));
    }

    #[test]
    fn test_validation_result_error_invalidates() {
        // ---
        let mut result = ValidationResult::valid();
        result.add_warning("humidity_very_high");
        assert!(result.is_valid);

        result.add_error("temperature_out_of_range");
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["temperature_out_of_range"]);
        assert_eq!(result.warnings, vec!["humidity_very_high"]);
    }

    #[test]
    fn test_outlier_flags_count() {
        // ---
        let flags = OutlierFlags {
            is_temperature_outlier: true,
            is_humidity_outlier: true,
        };
        assert_eq!(flags.count(), 2);
        assert!(flags.any());
        assert_eq!(OutlierFlags::default().count(), 0);
    }

    #[test]
    fn test_timeframe_parsing() {
        // ---
        let tf: Timeframe = "24h".parse().unwrap();
        assert_eq!(tf, Timeframe::OneDay);
        assert_eq!(tf.duration(), Duration::hours(24));
        assert_eq!("7d".parse::<Timeframe>().unwrap().duration(), Duration::days(7));

        let err = "2w".parse::<Timeframe>().unwrap_err();
        assert!(err.is_parameter_error());
    }

    #[test]
    fn test_comfort_level_round_trips_through_text() {
        // ---
        for level in [ComfortLevel::Cold, ComfortLevel::HotHumid, ComfortLevel::Warm] {
            assert_eq!(level.as_str().parse::<ComfortLevel>().unwrap(), level);
        }
        assert!("freezing".parse::<ComfortLevel>().is_err());
    }

    #[test]
    fn test_enriched_reading_serializes_flat_outlier_flags() {
        // ---
        let reading = EnrichedReading {
            device_id: "d1".into(),
            temperature: 20.0,
            humidity: 50.0,
            recorded_at: Utc::now(),
            processed_at: Utc::now(),
            heat_index: Some(20.0),
            dew_point: Some(9.3),
            comfort_level: Some(ComfortLevel::Comfortable),
            data_quality_score: 100.0,
            outliers: OutlierFlags::default(),
            validation: ValidationResult::valid(),
        };

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["is_temperature_outlier"], json!(false));
        assert_eq!(value["comfort_level"], json!("comfortable"));
        assert_eq!(value["validation"]["is_valid"], json!(true));
    }
}
