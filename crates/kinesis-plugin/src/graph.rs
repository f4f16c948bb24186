//! Graph rendering metadata handed to the agent alongside metric values.

use std::collections::BTreeMap;

use serde::Serialize;

pub const DEFAULT_PREFIX: &str = "kinesis-streams";

/// Display unit of a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Integer,
}

/// One line on a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphMetric {
    pub name: String,
    pub label: String,
    /// Counter metric reported as a per-minute delta against the previous run.
    #[serde(skip)]
    pub diff: bool,
    pub stacked: bool,
}

/// A named set of metrics drawn together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphGroup {
    pub label: String,
    pub unit: Unit,
    pub metrics: Vec<GraphMetric>,
}

struct GroupSpec {
    id: &'static str,
    suffix: &'static str,
    members: &'static [(&'static str, &'static str)],
}

const GROUPS: &[GroupSpec] = &[
    GroupSpec {
        id: "bytes",
        suffix: "Bytes",
        members: &[
            ("GetRecordsBytes", "GetRecords"),
            ("IncomingBytes", "Total Incoming"),
            ("PutRecordBytes", "PutRecord"),
            ("PutRecordsBytes", "PutRecords"),
        ],
    },
    GroupSpec {
        id: "iteratorage",
        suffix: "Read Delay",
        members: &[
            ("GetRecordsDelayMaxMilliseconds", "Max"),
            ("GetRecordsDelayMinMilliseconds", "min"),
        ],
    },
    GroupSpec {
        id: "latency",
        suffix: "Operation Latency",
        members: &[
            ("GetRecordsLatency", "GetRecords"),
            ("PutRecordLatency", "PutRecord"),
            ("PutRecordsLatency", "PutRecords"),
        ],
    },
    GroupSpec {
        id: "records",
        suffix: "Records",
        members: &[
            ("GetRecordsRecords", "GetRecords"),
            ("IncomingRecords", "Total Incoming"),
            ("PutRecordsRecords", "PutRecords"),
        ],
    },
    GroupSpec {
        id: "success",
        suffix: "Operation Success",
        members: &[
            ("GetRecordsSuccess", "GetRecords"),
            ("PutRecordSuccess", "PutRecord"),
            ("PutRecordsSuccess", "PutRecords"),
        ],
    },
    GroupSpec {
        id: "pending",
        suffix: "Pending Operations",
        members: &[
            ("ReadThroughputExceeded", "Read"),
            ("WriteThroughputExceeded", "Write"),
        ],
    },
];

/// Build the graph definitions keyed by group id.
///
/// `prefix` falls back to [`DEFAULT_PREFIX`] when empty; labels start with the
/// prefix title-cased and with hyphens turned into spaces, so
/// `"kinesis-streams"` labels the bytes graph `"Kinesis Streams Bytes"`.
pub fn describe(prefix: &str) -> BTreeMap<String, GraphGroup> {
    let display_prefix = display_prefix(prefix);

    GROUPS
        .iter()
        .map(|group| {
            let graph = GraphGroup {
                label: format!("{} {}", display_prefix, group.suffix),
                unit: Unit::Integer,
                metrics: group
                    .members
                    .iter()
                    .map(|(name, label)| GraphMetric {
                        name: name.to_string(),
                        label: label.to_string(),
                        diff: false,
                        stacked: false,
                    })
                    .collect(),
            };
            (group.id.to_string(), graph)
        })
        .collect()
}

fn display_prefix(prefix: &str) -> String {
    let prefix = if prefix.is_empty() { DEFAULT_PREFIX } else { prefix };
    title_case(prefix).replace('-', " ")
}

/// Upper-case the first letter of every word. Any character other than a
/// letter, digit or underscore starts a new word.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev = ' ';
    for c in s.chars() {
        if is_word_separator(prev) {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev = c;
    }
    out
}

fn is_word_separator(c: char) -> bool {
    if c.is_ascii() {
        return !(c.is_ascii_alphanumeric() || c == '_');
    }
    if c.is_alphanumeric() {
        return false;
    }
    c.is_whitespace()
}
