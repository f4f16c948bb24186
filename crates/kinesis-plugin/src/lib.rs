//! Kinesis Data Streams plugin for the monitoring agent.
//!
//! One run fetches the latest value of every metric in
//! [`metrics::KINESIS_METRICS`] for a single stream and prints it in the
//! agent's plugin format, or prints the graph definitions when the agent asks
//! for them.

pub mod config;
pub mod graph;
pub mod helper;
pub mod metrics;

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use kinesis_cloud::{FetchTarget, MetricFetcher, MetricResult, MetricSource};
use tracing_subscriber::EnvFilter;

use crate::config::PluginConfig;
use crate::graph::GraphGroup;
use crate::helper::{OutputMode, PluginHelper};

/// Default log directive. Matches both the `kinesis_plugin` and `kinesis_cloud` targets.
pub const DEFAULT_LOG_DIRECTIVE: &str = "kinesis=info";

/// `RUST_LOG` filter with [`DEFAULT_LOG_DIRECTIVE`] added.
pub fn log_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::from_default_env().add_directive(DEFAULT_LOG_DIRECTIVE.parse()?))
}

pub struct KinesisStreamsPlugin {
    prefix: String,
    fetcher: MetricFetcher,
}

impl KinesisStreamsPlugin {
    pub fn new(config: &PluginConfig, source: Arc<dyn MetricSource>) -> Self {
        let target = FetchTarget::new(metrics::NAMESPACE, metrics::DIMENSION_NAME, &config.identifier);
        Self {
            prefix: config.metric_key_prefix.clone(),
            fetcher: MetricFetcher::new(source, target, config.fetch.clone()),
        }
    }

    pub fn metric_key_prefix(&self) -> &str {
        if self.prefix.is_empty() {
            graph::DEFAULT_PREFIX
        } else {
            &self.prefix
        }
    }

    /// Latest value per output name; metrics that could not be fetched are absent.
    pub async fn fetch_metrics(&self) -> MetricResult {
        self.fetcher.fetch_all(metrics::KINESIS_METRICS).await
    }

    pub fn graph_definition(&self) -> BTreeMap<String, GraphGroup> {
        graph::describe(self.metric_key_prefix())
    }

    /// Produce the output the agent asked for.
    pub async fn run<W: Write>(&self, helper: &PluginHelper, mode: OutputMode, out: &mut W) -> Result<()> {
        let prefix = self.metric_key_prefix();
        let graphs = self.graph_definition();

        match mode {
            OutputMode::Definitions => helper.write_definitions(prefix, &graphs, out),
            OutputMode::Values => {
                let stat = self.fetch_metrics().await;
                if stat.is_empty() {
                    tracing::warn!(stream = %self.fetcher.target().dimension.value, "No metrics collected");
                }
                helper.write_values(prefix, &graphs, &stat, Utc::now(), out)
            }
        }
    }
}
