//! Read-only analytics over stored readings: windowed summaries, linear
//! trends, a data-quality report and a dashboard composed of all three.
//!
//! Summaries and trends look at valid readings only; the quality report looks
//! at everything, since invalid readings are exactly what it reports on. An
//! empty window yields `None` for every average/min/max rather than zero.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{EnrichedReading, Timeframe, TrendDirection, TrendResult};
use crate::repository::{ReadingFilter, ReadingRepository};

pub const MIN_TREND_DAYS: i64 = 1;
pub const MAX_TREND_DAYS: i64 = 90;

/// Hourly buckets fed to the regression, most recent kept.
pub const MAX_TREND_POINTS: usize = 100;

/// `|slope|` below this (units/hour) is reported as stable.
pub const STABLE_SLOPE_EPSILON: f64 = 0.01;
/// Interpretation buckets on `|slope|` (units/hour).
pub const SLIGHT_SLOPE_BELOW: f64 = 0.5;
pub const MODERATE_SLOPE_BELOW: f64 = 1.0;

/// Window counted as "recent" in the quality report.
pub const RECENT_WINDOW_HOURS: i64 = 24;
pub const TOP_ERROR_CODES: usize = 5;

pub const RECALIBRATION_SCORE_BELOW: f64 = 80.0;
pub const CONNECTIVITY_INVALID_ABOVE: usize = 10;
pub const PLACEMENT_OUTLIERS_ABOVE: usize = 50;

const INSUFFICIENT_TREND_DATA: &str = "Insufficient data for trend analysis";

// ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Average, minimum and maximum of one metric; all `None` for no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricStats {
    pub average: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricAverage {
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryQuality {
    pub average_score: Option<f64>,
    pub total_readings: usize,
    pub outliers_detected: usize,
    pub outlier_rate_percent: Option<f64>,
}

/// Aggregates over one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub timeframe: Timeframe,
    pub period: Period,
    pub temperature: MetricStats,
    pub humidity: MetricStats,
    pub heat_index: MetricAverage,
    pub data_quality: SummaryQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: i64,
}

/// Per-metric trends over the last `days` days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub period: TrendPeriod,
    /// Number of hourly buckets that went into the regression.
    pub data_points: usize,
    pub temperature_trend: Option<TrendResult>,
    pub humidity_trend: Option<TrendResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFreshness {
    Good,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityOverview {
    pub total_readings: usize,
    pub recent_readings_24h: usize,
    pub data_freshness: DataFreshness,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreStats {
    pub average_score: Option<f64>,
    pub minimum_score: Option<f64>,
    pub maximum_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorFrequency {
    pub code: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssues {
    pub invalid_records: usize,
    /// Most common error codes, descending by count.
    pub common_errors: Vec<ErrorFrequency>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutlierCounts {
    pub temperature_outliers: usize,
    pub humidity_outliers: usize,
    pub total_outliers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualityReport {
    pub generated_at: DateTime<Utc>,
    pub overview: QualityOverview,
    pub data_quality: ScoreStats,
    pub validation_issues: ValidationIssues,
    pub outliers: OutlierCounts,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentMetrics {
    pub temperature: MetricStats,
    pub humidity: MetricStats,
    pub heat_index: MetricAverage,
    pub data_quality_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardTrends {
    pub temperature: Option<TrendResult>,
    pub humidity: Option<TrendResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardAlerts {
    pub outliers_detected: usize,
    pub data_freshness: DataFreshness,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_readings: usize,
    pub recent_readings_24h: usize,
    pub outlier_rate: Option<f64>,
}

/// Merged view of `summary(24h)`, `trends(7)` and the quality report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub dashboard_generated_at: DateTime<Utc>,
    pub current_metrics: CurrentMetrics,
    pub trends: DashboardTrends,
    pub alerts: DashboardAlerts,
    pub summary: DashboardSummary,
}

// ---

/// Computes aggregate views from the storage collaborator. Never writes.
#[derive(Clone)]
pub struct AnalyticsEngine {
    repository: Arc<dyn ReadingRepository>,
}

impl AnalyticsEngine {
    // ---
    pub fn new(repository: Arc<dyn ReadingRepository>) -> Self {
        Self { repository }
    }

    /// Aggregate valid readings recorded within `timeframe` of now.
    pub async fn summary(&self, timeframe: Timeframe) -> Result<Summary> {
        // ---
        let end = Utc::now();
        let start = end - timeframe.duration();

        let records = self.repository.query(&ReadingFilter::between(start, end)).await?;
        let valid: Vec<&EnrichedReading> = records
            .iter()
            .map(|r| &r.reading)
            .filter(|r| r.is_valid())
            .collect();

        debug!("summary {}: {} valid of {} readings", timeframe, valid.len(), records.len());

        let total = valid.len();
        let outliers = valid.iter().filter(|r| r.outliers.any()).count();

        Ok(Summary {
            timeframe,
            period: Period { start, end },
            temperature: metric_stats(valid.iter().map(|r| r.temperature)),
            humidity: metric_stats(valid.iter().map(|r| r.humidity)),
            heat_index: MetricAverage {
                average: metric_stats(valid.iter().filter_map(|r| r.heat_index)).average,
            },
            data_quality: SummaryQuality {
                average_score: metric_stats(valid.iter().map(|r| r.data_quality_score)).average,
                total_readings: total,
                outliers_detected: outliers,
                outlier_rate_percent: (total > 0)
                    .then(|| round_to(outliers as f64 / total as f64 * 100.0, 2)),
            },
        })
    }

    /// Linear trends of temperature and humidity over the last `days` days.
    ///
    /// `days` outside `[1, 90]` is rejected before any query runs.
    pub async fn trends(&self, days: i64) -> Result<TrendReport> {
        // ---
        if !(MIN_TREND_DAYS..=MAX_TREND_DAYS).contains(&days) {
            return Err(Error::InvalidParameter {
                name: "days",
                message: format!("must be between {MIN_TREND_DAYS} and {MAX_TREND_DAYS}, got {days}"),
            });
        }

        let end = Utc::now();
        let start = end - Duration::days(days);
        let period = TrendPeriod { start, end, days };

        let records = self.repository.query(&ReadingFilter::between(start, end)).await?;
        let mut valid: Vec<&EnrichedReading> = records
            .iter()
            .map(|r| &r.reading)
            .filter(|r| r.is_valid())
            .collect();
        valid.sort_by_key(|r| r.recorded_at);

        let buckets = hourly_buckets(&valid);
        debug!("trends over {} days: {} hourly buckets", days, buckets.len());

        if buckets.len() < 2 {
            return Ok(TrendReport {
                period,
                data_points: buckets.len(),
                temperature_trend: None,
                humidity_trend: None,
                message: Some(INSUFFICIENT_TREND_DATA.to_string()),
            });
        }

        let temperature: Vec<(f64, f64)> = buckets.iter().map(|b| (b.hours, b.temperature)).collect();
        let humidity: Vec<(f64, f64)> = buckets.iter().map(|b| (b.hours, b.humidity)).collect();

        Ok(TrendReport {
            period,
            data_points: buckets.len(),
            temperature_trend: Some(classify_trend(linear_slope(&temperature), "temperature")),
            humidity_trend: Some(classify_trend(linear_slope(&humidity), "humidity")),
            message: None,
        })
    }

    /// Quality report over every stored reading.
    ///
    /// Counting is delegated to the storage collaborator so nothing is
    /// materialised here.
    pub async fn data_quality_report(&self) -> Result<DataQualityReport> {
        // ---
        let now = Utc::now();
        let recent_since = now - Duration::hours(RECENT_WINDOW_HOURS);

        let agg = self
            .repository
            .quality_aggregates(recent_since, TOP_ERROR_CODES)
            .await?;
        debug!("quality report over {} readings", agg.total_readings);

        let common_errors = agg
            .top_errors
            .into_iter()
            .map(|(code, count)| ErrorFrequency { code, count })
            .collect();

        let outliers = OutlierCounts {
            temperature_outliers: agg.temperature_outliers,
            humidity_outliers: agg.humidity_outliers,
            total_outliers: agg.temperature_outliers + agg.humidity_outliers,
        };

        let data_quality = ScoreStats {
            average_score: agg.average_score.map(|v| round_to(v, 2)),
            minimum_score: agg.minimum_score.map(|v| round_to(v, 2)),
            maximum_score: agg.maximum_score.map(|v| round_to(v, 2)),
        };

        Ok(DataQualityReport {
            generated_at: now,
            overview: QualityOverview {
                total_readings: agg.total_readings,
                recent_readings_24h: agg.recent_readings,
                data_freshness: if agg.recent_readings > 0 {
                    DataFreshness::Good
                } else {
                    DataFreshness::Stale
                },
            },
            recommendations: recommendations(
                &data_quality,
                agg.invalid_records,
                outliers.total_outliers,
            ),
            data_quality,
            validation_issues: ValidationIssues {
                invalid_records: agg.invalid_records,
                common_errors,
            },
            outliers,
        })
    }

    /// Merge the 24h summary, 7-day trends and quality report.
    pub async fn dashboard(&self) -> Result<Dashboard> {
        // ---
        let (summary, trends, quality) = tokio::join!(
            self.summary(Timeframe::OneDay),
            self.trends(7),
            self.data_quality_report()
        );
        let (summary, trends, quality) = (summary?, trends?, quality?);

        Ok(Dashboard {
            dashboard_generated_at: summary.period.end,
            current_metrics: CurrentMetrics {
                temperature: summary.temperature,
                humidity: summary.humidity,
                heat_index: summary.heat_index,
                data_quality_score: summary.data_quality.average_score,
            },
            trends: DashboardTrends {
                temperature: trends.temperature_trend,
                humidity: trends.humidity_trend,
            },
            alerts: DashboardAlerts {
                outliers_detected: quality.outliers.total_outliers,
                data_freshness: quality.overview.data_freshness,
                recommendations: quality.recommendations,
            },
            summary: DashboardSummary {
                total_readings: quality.overview.total_readings,
                recent_readings_24h: quality.overview.recent_readings_24h,
                outlier_rate: summary.data_quality.outlier_rate_percent,
            },
        })
    }
}

// ---

/// Mean of one clock hour of readings, positioned in hours from the first
/// bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HourlyBucket {
    hours: f64,
    temperature: f64,
    humidity: f64,
}

fn hourly_buckets(readings: &[&EnrichedReading]) -> Vec<HourlyBucket> {
    // ---
    let mut sums: BTreeMap<i64, (f64, f64, usize)> = BTreeMap::new();
    for r in readings {
        let hour = r.recorded_at.timestamp().div_euclid(3600);
        let entry = sums.entry(hour).or_insert((0.0, 0.0, 0));
        entry.0 += r.temperature;
        entry.1 += r.humidity;
        entry.2 += 1;
    }

    let skip = sums.len().saturating_sub(MAX_TREND_POINTS);
    let kept: Vec<(i64, (f64, f64, usize))> = sums.into_iter().skip(skip).collect();
    let Some(&(first_hour, _)) = kept.first() else {
        return Vec::new();
    };

    kept.into_iter()
        .map(|(hour, (t, h, n))| HourlyBucket {
            hours: (hour - first_hour) as f64,
            temperature: t / n as f64,
            humidity: h / n as f64,
        })
        .collect()
}

/// Least-squares slope of `y` against `x`; 0 when `x` has no spread.
pub fn linear_slope(points: &[(f64, f64)]) -> f64 {
    // ---
    let n = points.len() as f64;
    if points.len() < 2 {
        return 0.0;
    }

    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_x2: f64 = points.iter().map(|(x, _)| x * x).sum();

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denominator
}

/// Direction and wording for a slope in units/hour.
pub fn classify_trend(slope: f64, metric: &str) -> TrendResult {
    // ---
    let magnitude = slope.abs();
    let direction = if magnitude < STABLE_SLOPE_EPSILON {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    let interpretation = match direction {
        TrendDirection::Stable => format!("{metric} remains stable"),
        TrendDirection::Increasing | TrendDirection::Decreasing => {
            let adverb = if magnitude < SLIGHT_SLOPE_BELOW {
                "slightly"
            } else if magnitude < MODERATE_SLOPE_BELOW {
                "moderately"
            } else {
                "rapidly"
            };
            let verb = if direction == TrendDirection::Increasing {
                "increasing"
            } else {
                "decreasing"
            };
            format!("{metric} is {adverb} {verb}")
        }
    };

    TrendResult {
        direction,
        slope: round_to(slope, 4),
        interpretation,
    }
}

fn recommendations(scores: &ScoreStats, invalid_records: usize, total_outliers: usize) -> Vec<String> {
    // ---
    let mut out = Vec::new();

    if scores.average_score.is_some_and(|avg| avg < RECALIBRATION_SCORE_BELOW) {
        out.push(
            "Data quality is below acceptable levels. Consider reviewing sensor calibration."
                .to_string(),
        );
    }
    if invalid_records > CONNECTIVITY_INVALID_ABOVE {
        out.push(
            "High number of validation errors detected. Check sensor connectivity and data transmission."
                .to_string(),
        );
    }
    if total_outliers > PLACEMENT_OUTLIERS_ABOVE {
        out.push(
            "Frequent outliers detected. Verify sensor placement and environmental factors."
                .to_string(),
        );
    }
    if out.is_empty() {
        out.push("Data quality is good. Continue monitoring for optimal performance.".to_string());
    }

    out
}

fn metric_stats(values: impl Iterator<Item = f64>) -> MetricStats {
    // ---
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for v in values.filter(|v| v.is_finite()) {
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }

    if count == 0 {
        return MetricStats::default();
    }

    MetricStats {
        average: Some(round_to(sum / count as f64, 2)),
        minimum: Some(round_to(min, 2)),
        maximum: Some(round_to(max, 2)),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
