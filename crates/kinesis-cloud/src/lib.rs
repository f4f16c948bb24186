//! CloudWatch statistics client for single-resource metric plugins.
//!
//! The crate issues `GetMetricStatistics` queries against CloudWatch, reduces
//! each response to the most recent value, and fans a fixed set of
//! [`MetricDefinition`]s out over a bounded worker pool with
//! [`fetcher::MetricFetcher`]. Failures are per-metric: a missing value is
//! logged and left out of the result, never reported as zero.

pub mod cloudwatch;
pub mod credentials;
pub mod error;
pub mod fetcher;
pub mod region;
pub mod sigv4;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub use cloudwatch::CloudWatchClient;
pub use credentials::Credentials;
pub use error::{CloudWatchError, Result};
pub use fetcher::{FetchSettings, FetchTarget, MetricFetcher, MetricResult};
pub use region::Region;

/// Statistic CloudWatch applies over each period bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    Average,
    Sum,
    Maximum,
    Minimum,
}

impl Aggregation {
    /// Name used in the `Statistics` list of a query.
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Average => "Average",
            Aggregation::Sum => "Sum",
            Aggregation::Maximum => "Maximum",
            Aggregation::Minimum => "Minimum",
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One metric to collect: the CloudWatch metric name, the key it is reported
/// under, and the statistic to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDefinition {
    pub source_name: &'static str,
    pub output_name: &'static str,
    pub aggregation: Aggregation,
}

/// A CloudWatch dimension filter, e.g. `StreamName=orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Parameters of a single `GetMetricStatistics` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsQuery {
    #[serde(rename = "Namespace")]
    pub namespace: String,
    #[serde(rename = "MetricName")]
    pub metric_name: String,
    #[serde(rename = "Dimensions")]
    pub dimensions: Vec<Dimension>,
    #[serde(rename = "StartTime", with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "EndTime", with = "chrono::serde::ts_seconds")]
    pub end_time: DateTime<Utc>,
    #[serde(rename = "Period")]
    pub period_secs: u32,
    #[serde(rename = "Statistics")]
    pub statistics: Vec<Aggregation>,
}

/// One bucketed sample of a CloudWatch time series.
///
/// Only the statistics that were requested are present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Datapoint {
    #[serde(rename = "Timestamp", deserialize_with = "deserialize_epoch_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Average", default)]
    pub average: Option<f64>,
    #[serde(rename = "Sum", default)]
    pub sum: Option<f64>,
    #[serde(rename = "Maximum", default)]
    pub maximum: Option<f64>,
    #[serde(rename = "Minimum", default)]
    pub minimum: Option<f64>,
    #[serde(rename = "Unit", default)]
    pub unit: Option<String>,
}

impl Datapoint {
    /// Value of the given statistic, if the point carries it.
    pub fn value(&self, aggregation: Aggregation) -> Option<f64> {
        match aggregation {
            Aggregation::Average => self.average,
            Aggregation::Sum => self.sum,
            Aggregation::Maximum => self.maximum,
            Aggregation::Minimum => self.minimum,
        }
    }
}

fn deserialize_epoch_seconds<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {secs}")))
}

/// Source of CloudWatch statistics.
///
/// Implemented by [`CloudWatchClient`]; tests substitute in-memory sources.
#[async_trait::async_trait]
pub trait MetricSource: Send + Sync {
    async fn get_metric_statistics(&self, query: &StatisticsQuery) -> Result<Vec<Datapoint>>;
}

/// Reduce a response to the value of its most recent datapoint.
///
/// Points sharing the greatest timestamp resolve to the one that appears last
/// in response order.
///
/// # Errors
///
/// [`CloudWatchError::NoDatapoints`] for an empty response and
/// [`CloudWatchError::MissingStatistic`] when the latest point lacks the
/// requested statistic.
pub fn latest_value(
    metric: &str,
    datapoints: &[Datapoint],
    aggregation: Aggregation,
) -> Result<f64> {
    let latest = datapoints
        .iter()
        .fold(None::<&Datapoint>, |best, dp| match best {
            Some(b) if dp.timestamp < b.timestamp => Some(b),
            _ => Some(dp),
        })
        .ok_or_else(|| CloudWatchError::NoDatapoints {
            metric: metric.to_string(),
        })?;

    latest
        .value(aggregation)
        .ok_or_else(|| CloudWatchError::MissingStatistic {
            metric: metric.to_string(),
            statistic: aggregation.to_string(),
        })
}
