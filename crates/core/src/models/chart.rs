use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::price::{ExchangeRate, PreviousPrice};

/// A single point of the assembled price chart.
///
/// Generated by the chart service; presentation layers only render them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataPoint {
    pub date: NaiveDate,

    /// Observed USD price; absent for future dates and unfetched gaps
    pub price: Option<f64>,

    pub median_model: f64,

    pub support_model: f64,

    pub days_since_genesis: i64,

    pub is_future: bool,
}

impl ChartDataPoint {
    /// Milliseconds since the Unix epoch at midnight UTC of `date`.
    pub fn timestamp_ms(&self) -> i64 {
        self.date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or_default()
    }
}

/// Sampling step of the assembled series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Daily,
    Monthly,
}

/// Where the latest-price figures of a `ChartSeries` came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    /// Served from a fresh chart-series cache record
    Cache,
    /// A live provider, by name
    Provider(String),
    /// Every provider failed; latest baseline point used
    Baseline,
    /// No data at all; built-in constant used
    Default,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Cache => write!(f, "cache"),
            DataSource::Provider(name) => write!(f, "provider:{name}"),
            DataSource::Baseline => write!(f, "baseline"),
            DataSource::Default => write!(f, "default"),
        }
    }
}

/// Output of one assembly pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    /// Wall-clock time (epoch ms) at which the data was assembled
    pub timestamp_ms: i64,

    /// Ascending, deduplicated by date
    pub points: Vec<ChartDataPoint>,

    pub latest_price_usd: f64,

    pub previous_price: PreviousPrice,

    pub exchange_rate: ExchangeRate,

    /// Log-log goodness of fit; `None` when degenerate
    pub r_squared: Option<f64>,

    pub source: DataSource,

    /// `true` when every live provider failed
    pub degraded: bool,
}
