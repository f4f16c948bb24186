use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use kinesis_cloud::{
    CloudWatchError, Credentials, Datapoint, FetchSettings, MetricSource, Region, StatisticsQuery,
};
use kinesis_plugin::config::PluginConfig;
use kinesis_plugin::helper::{OutputMode, PluginHelper};
use kinesis_plugin::metrics::KINESIS_METRICS;
use kinesis_plugin::KinesisStreamsPlugin;

/// Serves one datapoint per metric, except for the metrics told to fail or be empty.
struct FakeCloudWatch {
    failing: Vec<&'static str>,
    empty: Vec<&'static str>,
    queries: Mutex<Vec<StatisticsQuery>>,
}

impl FakeCloudWatch {
    fn new(failing: Vec<&'static str>, empty: Vec<&'static str>) -> Self {
        Self {
            failing,
            empty,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl MetricSource for FakeCloudWatch {
    async fn get_metric_statistics(
        &self,
        query: &StatisticsQuery,
    ) -> kinesis_cloud::Result<Vec<Datapoint>> {
        self.queries.lock().unwrap().push(query.clone());

        if self.failing.iter().any(|m| *m == query.metric_name) {
            return Err(CloudWatchError::ApiResponseError {
                code: "AccessDenied".to_string(),
                message: "not authorized to perform cloudwatch:GetMetricStatistics".to_string(),
            });
        }
        if self.empty.iter().any(|m| *m == query.metric_name) {
            return Ok(Vec::new());
        }

        let value = 42.0;
        let stat = query.statistics[0];
        let point = |secs: i64, v: f64| Datapoint {
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            average: (stat == kinesis_cloud::Aggregation::Average).then_some(v),
            sum: (stat == kinesis_cloud::Aggregation::Sum).then_some(v),
            maximum: (stat == kinesis_cloud::Aggregation::Maximum).then_some(v),
            minimum: (stat == kinesis_cloud::Aggregation::Minimum).then_some(v),
            unit: None,
        };
        Ok(vec![point(1_700_000_120, value), point(1_700_000_060, -1.0)])
    }
}

fn config(tempfile: &Path) -> PluginConfig {
    PluginConfig {
        identifier: "orders".to_string(),
        region: Region::parse("ap-northeast-1").unwrap(),
        credentials: Credentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: None,
        },
        metric_key_prefix: "kinesis-streams".to_string(),
        tempfile: tempfile.to_path_buf(),
        fetch: FetchSettings::default(),
    }
}

#[tokio::test]
async fn all_metrics_are_collected_when_cloudwatch_answers() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeCloudWatch::new(vec![], vec![]));
    let plugin = KinesisStreamsPlugin::new(&config(&dir.path().join("state")), source.clone());

    let stat = plugin.fetch_metrics().await;

    assert_eq!(stat.len(), KINESIS_METRICS.len());
    assert!(stat.values().all(|v| *v == 42.0));

    let queries = source.queries.lock().unwrap();
    assert_eq!(queries.len(), 17);
    assert!(queries.iter().all(|q| q.namespace == "AWS/Kinesis"
        && q.dimensions[0].name == "StreamName"
        && q.dimensions[0].value == "orders"));
}

#[tokio::test]
async fn one_failing_query_leaves_sixteen_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeCloudWatch::new(vec!["IncomingBytes"], vec![]));
    let plugin = KinesisStreamsPlugin::new(&config(&dir.path().join("state")), source);

    let stat = plugin.fetch_metrics().await;

    assert_eq!(stat.len(), 16);
    assert!(!stat.contains_key("IncomingBytes"));
}

#[tokio::test]
async fn empty_series_is_omitted_not_zeroed() {
    let dir = tempfile::tempdir().unwrap();
    // Iterator age backs two outputs (max and min).
    let source = Arc::new(FakeCloudWatch::new(vec![], vec!["GetRecords.IteratorAgeMilliseconds"]));
    let plugin = KinesisStreamsPlugin::new(&config(&dir.path().join("state")), source);

    let stat = plugin.fetch_metrics().await;

    assert_eq!(stat.len(), 15);
    assert!(!stat.contains_key("GetRecordsDelayMaxMilliseconds"));
    assert!(!stat.contains_key("GetRecordsDelayMinMilliseconds"));
    assert_eq!(stat.get("GetRecordsBytes"), Some(&42.0));
}

#[tokio::test]
async fn every_query_failing_still_succeeds_with_no_output() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let failing: Vec<&'static str> = KINESIS_METRICS.iter().map(|m| m.source_name).collect();
    let source = Arc::new(FakeCloudWatch::new(failing, vec![]));
    let plugin = KinesisStreamsPlugin::new(&config(&dir.path().join("state")), source);
    let helper = PluginHelper::new(dir.path().join("state"));

    let mut out = Vec::new();
    plugin.run(&helper, OutputMode::Values, &mut out).await?;

    assert!(out.is_empty());
    Ok(())
}

#[tokio::test]
async fn value_mode_prints_prefixed_lines_for_fetched_metrics() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeCloudWatch::new(vec!["PutRecords.Latency"], vec![]));
    let plugin = KinesisStreamsPlugin::new(&config(&dir.path().join("state")), source);
    let helper = PluginHelper::new(dir.path().join("state"));

    let before = Utc::now().timestamp();
    let mut out = Vec::new();
    plugin.run(&helper, OutputMode::Values, &mut out).await?;
    let text = String::from_utf8(out)?;

    let lines: HashMap<&str, (&str, i64)> = text
        .lines()
        .map(|line| {
            let mut parts = line.split('\t');
            let key = parts.next().unwrap();
            let value = parts.next().unwrap();
            let epoch: i64 = parts.next().unwrap().parse().unwrap();
            (key, (value, epoch))
        })
        .collect();

    assert_eq!(lines.len(), 16);
    assert_eq!(lines["kinesis-streams.bytes.IncomingBytes"].0, "42.000000");
    assert_eq!(lines["kinesis-streams.iteratorage.GetRecordsDelayMinMilliseconds"].0, "42.000000");
    assert!(lines["kinesis-streams.pending.WriteThroughputExceeded"].1 >= before);
    assert!(!lines.contains_key("kinesis-streams.latency.PutRecordsLatency"));
    assert!(!dir.path().join("state").exists());
    Ok(())
}

#[tokio::test]
async fn definition_mode_prints_graphs_without_querying() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeCloudWatch::new(vec![], vec![]));
    let mut cfg = config(&dir.path().join("state"));
    cfg.metric_key_prefix = "orders-stream".to_string();
    let plugin = KinesisStreamsPlugin::new(&cfg, source.clone());
    let helper = PluginHelper::new(cfg.tempfile.clone());

    let mut out = Vec::new();
    plugin.run(&helper, OutputMode::Definitions, &mut out).await?;
    let text = String::from_utf8(out)?;

    assert!(text.starts_with("# mackerel-agent-plugin\n"));
    let json: serde_json::Value = serde_json::from_str(text.lines().nth(1).unwrap())?;
    assert_eq!(json["graphs"]["orders-stream.bytes"]["label"], "Orders Stream Bytes");
    assert_eq!(json["graphs"]["orders-stream.latency"]["label"], "Orders Stream Operation Latency");
    assert!(source.queries.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn metric_key_prefix_defaults_when_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&dir.path().join("state"));
    cfg.metric_key_prefix = String::new();
    let plugin = KinesisStreamsPlugin::new(&cfg, Arc::new(FakeCloudWatch::new(vec![], vec![])));

    assert_eq!(plugin.metric_key_prefix(), "kinesis-streams");
    assert_eq!(plugin.graph_definition()["bytes"].label, "Kinesis Streams Bytes");
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn failed_fetches_are_logged_under_the_default_filter() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_env_filter(kinesis_plugin::log_filter().unwrap())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FakeCloudWatch::new(vec!["IncomingBytes"], vec![]));
    let plugin = KinesisStreamsPlugin::new(&config(&dir.path().join("state")), source);

    let stat = plugin.fetch_metrics().await;
    assert_eq!(stat.len(), 16);

    let text = logs.contents();
    let warned: Vec<&str> = text
        .lines()
        .filter(|line| line.contains("WARN") && line.contains("kinesis_cloud::fetcher"))
        .collect();
    assert_eq!(warned.len(), 1, "captured logs:\n{text}");
    assert!(warned[0].contains("Failed to fetch metric"));
    assert!(warned[0].contains("metric=\"IncomingBytes\""));
    assert!(warned[0].contains("AccessDenied"));
}
