use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::error::{CloudWatchError, Result};
use crate::{latest_value, Dimension, MetricDefinition, MetricSource, StatisticsQuery};

/// Output name to latest value. A metric that could not be fetched has no entry.
pub type MetricResult = HashMap<String, f64>;

/// The CloudWatch namespace and dimension identifying the monitored resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub namespace: String,
    pub dimension: Dimension,
}

impl FetchTarget {
    pub fn new(namespace: &str, dimension_name: &str, dimension_value: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            dimension: Dimension {
                name: dimension_name.to_string(),
                value: dimension_value.to_string(),
            },
        }
    }
}

/// Query window and worker-pool tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Trailing window ending at query time.
    pub window: Duration,
    pub period_secs: u32,
    /// Maximum number of queries in flight.
    pub concurrency: usize,
    /// Budget for a single metric fetch.
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(180),
            period_secs: 60,
            concurrency: 4,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Best-effort collector for a fixed set of metric definitions.
#[derive(Clone)]
pub struct MetricFetcher {
    source: Arc<dyn MetricSource>,
    target: FetchTarget,
    settings: FetchSettings,
}

impl MetricFetcher {
    pub fn new(source: Arc<dyn MetricSource>, target: FetchTarget, settings: FetchSettings) -> Self {
        Self {
            source,
            target,
            settings,
        }
    }

    pub fn target(&self) -> &FetchTarget {
        &self.target
    }

    fn query_for(&self, definition: &MetricDefinition) -> StatisticsQuery {
        let end_time = Utc::now();
        let window = chrono::Duration::from_std(self.settings.window)
            .unwrap_or_else(|_| chrono::Duration::seconds(180));

        StatisticsQuery {
            namespace: self.target.namespace.clone(),
            metric_name: definition.source_name.to_string(),
            dimensions: vec![self.target.dimension.clone()],
            start_time: end_time - window,
            end_time,
            period_secs: self.settings.period_secs,
            statistics: vec![definition.aggregation],
        }
    }

    /// Fetch the latest value of one metric.
    ///
    /// # Errors
    ///
    /// Propagates the query error, or [`CloudWatchError::NoDatapoints`] when the
    /// window is empty.
    pub async fn fetch_one(&self, definition: &MetricDefinition) -> Result<f64> {
        let query = self.query_for(definition);
        let datapoints = self.source.get_metric_statistics(&query).await?;
        latest_value(definition.source_name, &datapoints, definition.aggregation)
    }

    /// Fetch every definition, skipping the ones that fail.
    ///
    /// Never fails: a failed or timed-out metric is logged and omitted.
    pub async fn fetch_all(&self, definitions: &[MetricDefinition]) -> MetricResult {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = Vec::with_capacity(definitions.len());

        for definition in definitions.iter().copied() {
            let sem = Arc::clone(&semaphore);
            let fetcher = self.clone();
            let budget = self.settings.timeout;

            let task = tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return None;
                };

                let outcome = match timeout(budget, fetcher.fetch_one(&definition)).await {
                    Ok(result) => result,
                    Err(_) => Err(CloudWatchError::Timeout {
                        metric: definition.source_name.to_string(),
                        secs: budget.as_secs(),
                    }),
                };

                match outcome {
                    Ok(value) => Some((definition.output_name, value)),
                    Err(e) => {
                        tracing::warn!(
                            metric = definition.output_name,
                            source = definition.source_name,
                            statistic = %definition.aggregation,
                            error = %e,
                            "Failed to fetch metric"
                        );
                        None
                    }
                }
            });

            tasks.push(task);
        }

        let mut results = MetricResult::with_capacity(definitions.len());
        for task in tasks {
            match task.await {
                Ok(Some((name, value))) => {
                    results.insert(name.to_string(), value);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Fetch task panicked: {}", e);
                }
            }
        }

        tracing::debug!(
            collected = results.len(),
            requested = definitions.len(),
            dimension = %self.target.dimension.value,
            "Fetched metrics"
        );
        results
    }
}
