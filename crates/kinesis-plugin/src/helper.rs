//! Agent plugin output contract.
//!
//! The agent runs the plugin once per interval. With
//! `MACKEREL_AGENT_PLUGIN_META` set it expects graph definitions as JSON,
//! otherwise one `key\tvalue\tepoch` line per metric.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::graph::GraphGroup;

pub const META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";
pub const WORKDIR_ENV: &str = "MACKEREL_PLUGIN_WORKDIR";

const META_HEADER: &str = "# mackerel-agent-plugin";
const LAST_TIME_KEY: &str = "_lastTime";
/// Deltas computed across a longer gap than this are discarded.
const MAX_DIFF_INTERVAL_SECS: i64 = 600;

/// What the agent asked for on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Definitions,
    Values,
}

impl OutputMode {
    pub fn from_env() -> Self {
        match std::env::var(META_ENV) {
            Ok(v) if !v.is_empty() => OutputMode::Definitions,
            _ => OutputMode::Values,
        }
    }
}

#[derive(Serialize)]
struct GraphDefinitionDocument<'a> {
    graphs: BTreeMap<String, &'a GraphGroup>,
}

/// Writes plugin output and keeps the previous-run values needed for counters.
#[derive(Debug, Clone)]
pub struct PluginHelper {
    tempfile: PathBuf,
}

impl PluginHelper {
    pub fn new(tempfile: PathBuf) -> Self {
        Self { tempfile }
    }

    pub fn tempfile(&self) -> &Path {
        &self.tempfile
    }

    /// Default state file: `$MACKEREL_PLUGIN_WORKDIR` (or the OS temp dir)
    /// joined with `mackerel-plugin-<prefix>-<identifier>`.
    pub fn default_tempfile(prefix: &str, identifier: &str) -> PathBuf {
        let dir = std::env::var_os(WORKDIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        dir.join(format!("mackerel-plugin-{prefix}-{identifier}"))
    }

    /// Print the graph meta document.
    pub fn write_definitions<W: Write>(
        &self,
        prefix: &str,
        graphs: &BTreeMap<String, GraphGroup>,
        out: &mut W,
    ) -> Result<()> {
        let document = GraphDefinitionDocument {
            graphs: graphs
                .iter()
                .map(|(id, graph)| (prefixed(prefix, id), graph))
                .collect(),
        };

        writeln!(out, "{META_HEADER}")?;
        serde_json::to_writer(&mut *out, &document).context("Failed to encode graph definitions")?;
        writeln!(out)?;
        Ok(())
    }

    /// Print one line per graphed metric present in `stat`.
    ///
    /// Counter (`diff`) metrics are converted to per-minute deltas against the
    /// values saved by the previous run; the current values are then saved.
    pub fn write_values<W: Write>(
        &self,
        prefix: &str,
        graphs: &BTreeMap<String, GraphGroup>,
        stat: &HashMap<String, f64>,
        now: DateTime<Utc>,
        out: &mut W,
    ) -> Result<()> {
        let has_diff = graphs.values().flat_map(|g| &g.metrics).any(|m| m.diff);
        let last = if has_diff {
            let last = self.load_last_values()?;
            self.save_values(stat, now)?;
            Some(last)
        } else {
            None
        };

        let epoch = now.timestamp();
        for (id, graph) in graphs {
            let key = prefixed(prefix, id);
            for metric in &graph.metrics {
                let Some(&value) = stat.get(&metric.name) else {
                    continue;
                };

                let value = match (&last, metric.diff) {
                    (Some(last), true) => match last.diff(&metric.name, value, epoch) {
                        Some(delta) => delta,
                        None => continue,
                    },
                    _ => value,
                };

                writeln!(out, "{}.{}\t{:.6}\t{}", key, metric.name, value, epoch)?;
            }
        }
        Ok(())
    }

    fn load_last_values(&self) -> Result<LastValues> {
        let content = match std::fs::read_to_string(&self.tempfile) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LastValues::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.tempfile.display()))
            }
        };

        let mut values: HashMap<String, f64> = match serde_json::from_str(&content) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(path = %self.tempfile.display(), error = %e, "Ignoring unreadable tempfile");
                return Ok(LastValues::default());
            }
        };
        let last_time = values.remove(LAST_TIME_KEY).map(|t| t as i64);
        Ok(LastValues { values, last_time })
    }

    fn save_values(&self, stat: &HashMap<String, f64>, now: DateTime<Utc>) -> Result<()> {
        let mut saved = stat.clone();
        saved.insert(LAST_TIME_KEY.to_string(), now.timestamp() as f64);

        let content = serde_json::to_string(&saved)?;
        std::fs::write(&self.tempfile, content)
            .with_context(|| format!("Failed to write {}", self.tempfile.display()))
    }
}

#[derive(Debug, Default)]
struct LastValues {
    values: HashMap<String, f64>,
    last_time: Option<i64>,
}

impl LastValues {
    /// Per-minute delta, or `None` when there is no usable previous value.
    fn diff(&self, name: &str, value: f64, now: i64) -> Option<f64> {
        let last_time = self.last_time?;
        let last_value = *self.values.get(name)?;

        let elapsed = now - last_time;
        if elapsed <= 0 || elapsed > MAX_DIFF_INTERVAL_SECS {
            tracing::debug!(metric = name, elapsed, "Previous value too old for a delta");
            return None;
        }

        let delta = (value - last_value) * 60.0 / elapsed as f64;
        if delta < 0.0 {
            tracing::warn!(metric = name, "Counter seems to be reset");
            return None;
        }
        Some(delta)
    }
}

fn prefixed(prefix: &str, id: &str) -> String {
    if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{prefix}.{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{describe, GraphMetric, Unit};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn counter_graphs() -> BTreeMap<String, GraphGroup> {
        let mut graphs = BTreeMap::new();
        graphs.insert(
            "requests".to_string(),
            GraphGroup {
                label: "Requests".to_string(),
                unit: Unit::Integer,
                metrics: vec![
                    GraphMetric {
                        name: "Total".to_string(),
                        label: "Total".to_string(),
                        diff: true,
                        stacked: false,
                    },
                    GraphMetric {
                        name: "Current".to_string(),
                        label: "Current".to_string(),
                        diff: false,
                        stacked: false,
                    },
                ],
            },
        );
        graphs
    }

    fn render_values(
        helper: &PluginHelper,
        graphs: &BTreeMap<String, GraphGroup>,
        stat: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> String {
        let mut out = Vec::new();
        helper.write_values("test", graphs, stat, now, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn values_are_keyed_by_prefix_graph_and_metric() {
        let dir = tempfile::tempdir().unwrap();
        let helper = PluginHelper::new(dir.path().join("state"));
        let stat = HashMap::from([
            ("IncomingBytes".to_string(), 1024.0),
            ("ReadThroughputExceeded".to_string(), 0.5),
        ]);

        let mut out = Vec::new();
        helper
            .write_values("kinesis-streams", &describe("kinesis-streams"), &stat, at(1_700_000_000), &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "kinesis-streams.bytes.IncomingBytes\t1024.000000\t1700000000\n\
             kinesis-streams.pending.ReadThroughputExceeded\t0.500000\t1700000000\n"
        );
    }

    #[test]
    fn gauges_never_touch_the_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        let helper = PluginHelper::new(path.clone());
        let stat = HashMap::from([("IncomingBytes".to_string(), 1.0)]);

        let mut out = Vec::new();
        helper
            .write_values("kinesis-streams", &describe("kinesis-streams"), &stat, at(100), &mut out)
            .unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn definitions_are_prefixed_json_after_header() {
        let helper = PluginHelper::new(PathBuf::from("/nonexistent"));
        let mut out = Vec::new();
        helper
            .write_definitions("kinesis-streams", &describe("kinesis-streams"), &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        let (header, body) = text.split_once('\n').unwrap();
        assert_eq!(header, "# mackerel-agent-plugin");
        let json: serde_json::Value = serde_json::from_str(body.trim()).unwrap();
        let bytes = &json["graphs"]["kinesis-streams.bytes"];
        assert_eq!(bytes["label"], "Kinesis Streams Bytes");
        assert_eq!(bytes["unit"], "integer");
        assert_eq!(bytes["metrics"][1]["name"], "IncomingBytes");
        assert_eq!(bytes["metrics"][1]["label"], "Total Incoming");
        assert_eq!(json["graphs"].as_object().unwrap().len(), 6);
    }

    #[test]
    fn counters_are_reported_as_per_minute_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let helper = PluginHelper::new(dir.path().join("state"));
        let graphs = counter_graphs();

        // First run has no history: only the gauge is printed.
        let first = HashMap::from([("Total".to_string(), 100.0), ("Current".to_string(), 7.0)]);
        let text = render_values(&helper, &graphs, &first, at(1_000));
        assert_eq!(text, "test.requests.Current\t7.000000\t1000\n");

        // 120 seconds later the counter grew by 60: 30 per minute.
        let second = HashMap::from([("Total".to_string(), 160.0), ("Current".to_string(), 8.0)]);
        let text = render_values(&helper, &graphs, &second, at(1_120));
        assert_eq!(
            text,
            "test.requests.Total\t30.000000\t1120\ntest.requests.Current\t8.000000\t1120\n"
        );
    }

    #[test]
    fn counter_reset_and_stale_history_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let helper = PluginHelper::new(dir.path().join("state"));
        let graphs = counter_graphs();

        render_values(&helper, &graphs, &HashMap::from([("Total".to_string(), 500.0)]), at(1_000));
        let text = render_values(&helper, &graphs, &HashMap::from([("Total".to_string(), 10.0)]), at(1_060));
        assert_eq!(text, "");

        let text = render_values(&helper, &graphs, &HashMap::from([("Total".to_string(), 20.0)]), at(5_000));
        assert_eq!(text, "");
    }

    #[test]
    fn corrupt_tempfile_is_treated_as_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        std::fs::write(&path, "not json").unwrap();
        let helper = PluginHelper::new(path.clone());

        let text = render_values(&helper, &counter_graphs(), &HashMap::from([("Total".to_string(), 1.0)]), at(10));
        assert_eq!(text, "");

        let saved: HashMap<String, f64> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.get("Total"), Some(&1.0));
        assert_eq!(saved.get("_lastTime"), Some(&10.0));
    }

    #[test]
    fn default_tempfile_names_prefix_and_stream() {
        let path = PluginHelper::default_tempfile("kinesis-streams", "orders");
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "mackerel-plugin-kinesis-streams-orders"
        );
    }
}
