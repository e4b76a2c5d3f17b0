//! Derived physical quantities: heat index, dew point and comfort level.
//!
//! Heat index uses the NOAA Rothfusz regression, which is only defined for
//! warm and humid air (≥ 80 °F and ≥ 40 %RH). Outside that domain the heat
//! index *is* the air temperature; this is the formula's natural boundary.
//!
//! Dew point uses the Magnus-Tetens approximation with `a = 17.27` and
//! `b = 237.7 °C`.
//!
//! Comfort cut points (heat index `HI` in °C, relative humidity `RH` in %),
//! evaluated top to bottom:
//!
//! | condition                          | level         |
//! |------------------------------------|---------------|
//! | `HI < 18`                          | `cold`        |
//! | `HI > 26` and `RH >= 70`           | `hot_humid`   |
//! | `HI >= 32`                         | `hot`         |
//! | `HI > 26`                          | `warm`        |
//! | `20 <= HI <= 24` and `40 <= RH <= 60` | `comfortable` |
//! | `RH >= 70`                         | `humid`       |
//! | otherwise                          | `mild`        |

use crate::error::ProcessingFault;
use crate::models::ComfortLevel;

const STAGE: &str = "enrich";

/// Lower edge of the Rothfusz regression domain, °F.
pub const HEAT_INDEX_MIN_TEMP_F: f64 = 80.0;
/// Lower edge of the Rothfusz regression domain, %RH.
pub const HEAT_INDEX_MIN_HUMIDITY: f64 = 40.0;

const MAGNUS_A: f64 = 17.27;
const MAGNUS_B: f64 = 237.7;

pub const COLD_BELOW_C: f64 = 18.0;
pub const WARM_ABOVE_C: f64 = 26.0;
pub const HOT_FROM_C: f64 = 32.0;
pub const HUMID_FROM_PCT: f64 = 70.0;
pub const COMFORT_TEMP_C: (f64, f64) = (20.0, 24.0);
pub const COMFORT_HUMIDITY_PCT: (f64, f64) = (40.0, 60.0);

// ---

/// Derived fields for one temperature/humidity pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Enrichment {
    pub heat_index: f64,
    /// `None` when the humidity leaves the logarithm undefined (`RH <= 0`).
    pub dew_point: Option<f64>,
    pub comfort_level: ComfortLevel,
}

/// Compute heat index, dew point and comfort level.
///
/// Runs on the raw values regardless of validity. Fails only when an input is
/// not a finite number.
pub fn enrich(temperature: f64, humidity: f64) -> Result<Enrichment, ProcessingFault> {
    // ---
    if !temperature.is_finite() || !humidity.is_finite() {
        return Err(ProcessingFault::NonFiniteInput {
            stage: STAGE,
            temperature,
            humidity,
        });
    }

    let heat_index = heat_index(temperature, humidity);
    if !heat_index.is_finite() {
        return Err(ProcessingFault::NonFiniteOutput {
            stage: STAGE,
            field: "heat_index",
        });
    }

    Ok(Enrichment {
        heat_index: round2(heat_index),
        dew_point: dew_point(temperature, humidity).map(round2),
        comfort_level: classify_comfort(heat_index, humidity),
    })
}

/// NOAA heat index in °C, falling back to the air temperature outside the
/// regression domain.
pub fn heat_index(temp_c: f64, humidity: f64) -> f64 {
    // ---
    let t = celsius_to_fahrenheit(temp_c);
    let rh = humidity;

    if t < HEAT_INDEX_MIN_TEMP_F || rh < HEAT_INDEX_MIN_HUMIDITY {
        return temp_c;
    }

    let mut hi = -42.379 + 2.04901523 * t + 10.14333127 * rh
        - 0.22475541 * t * rh
        - 0.00683783 * t * t
        - 0.05481717 * rh * rh
        + 0.00122874 * t * t * rh
        + 0.00085282 * t * rh * rh
        - 0.00000199 * t * t * rh * rh;

    // NOAA high-humidity correction
    if rh > 85.0 && t <= 87.0 {
        hi += ((rh - 85.0) / 10.0) * ((87.0 - t) / 5.0);
    }

    fahrenheit_to_celsius(hi)
}

/// Magnus-Tetens dew point in °C.
pub fn dew_point(temp_c: f64, humidity: f64) -> Option<f64> {
    // ---
    if humidity <= 0.0 {
        return None;
    }

    let alpha = (MAGNUS_A * temp_c) / (MAGNUS_B + temp_c) + (humidity / 100.0).ln();
    let dew_point = (MAGNUS_B * alpha) / (MAGNUS_A - alpha);

    dew_point.is_finite().then_some(dew_point)
}

/// Map heat index and humidity onto a comfort level using the fixed cut
/// points in the module docs.
pub fn classify_comfort(heat_index_c: f64, humidity: f64) -> ComfortLevel {
    // ---
    let (comfort_lo, comfort_hi) = COMFORT_TEMP_C;
    let (humidity_lo, humidity_hi) = COMFORT_HUMIDITY_PCT;

    if heat_index_c < COLD_BELOW_C {
        ComfortLevel::Cold
    } else if heat_index_c > WARM_ABOVE_C && humidity >= HUMID_FROM_PCT {
        ComfortLevel::HotHumid
    } else if heat_index_c >= HOT_FROM_C {
        ComfortLevel::Hot
    } else if heat_index_c > WARM_ABOVE_C {
        ComfortLevel::Warm
    } else if (comfort_lo..=comfort_hi).contains(&heat_index_c)
        && (humidity_lo..=humidity_hi).contains(&humidity)
    {
        ComfortLevel::Comfortable
    } else if humidity >= HUMID_FROM_PCT {
        ComfortLevel::Humid
    } else {
        ComfortLevel::Mild
    }
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    (c * 9.0 / 5.0) + 32.0
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
