//! The fixed set of Kinesis Data Streams metrics this plugin reports.

use kinesis_cloud::{Aggregation, MetricDefinition};

pub const NAMESPACE: &str = "AWS/Kinesis";
pub const DIMENSION_NAME: &str = "StreamName";

const fn metric(
    source_name: &'static str,
    output_name: &'static str,
    aggregation: Aggregation,
) -> MetricDefinition {
    MetricDefinition {
        source_name,
        output_name,
        aggregation,
    }
}

pub const KINESIS_METRICS: &[MetricDefinition] = &[
    metric("GetRecords.Bytes", "GetRecordsBytes", Aggregation::Average),
    metric("GetRecords.IteratorAgeMilliseconds", "GetRecordsDelayMaxMilliseconds", Aggregation::Maximum),
    metric("GetRecords.IteratorAgeMilliseconds", "GetRecordsDelayMinMilliseconds", Aggregation::Minimum),
    metric("GetRecords.Latency", "GetRecordsLatency", Aggregation::Average),
    metric("GetRecords.Records", "GetRecordsRecords", Aggregation::Average),
    metric("GetRecords.Success", "GetRecordsSuccess", Aggregation::Average),
    metric("IncomingBytes", "IncomingBytes", Aggregation::Average),
    metric("IncomingRecords", "IncomingRecords", Aggregation::Average),
    metric("PutRecord.Bytes", "PutRecordBytes", Aggregation::Average),
    metric("PutRecord.Latency", "PutRecordLatency", Aggregation::Average),
    metric("PutRecord.Success", "PutRecordSuccess", Aggregation::Average),
    metric("PutRecords.Bytes", "PutRecordsBytes", Aggregation::Average),
    metric("PutRecords.Latency", "PutRecordsLatency", Aggregation::Average),
    metric("PutRecords.Records", "PutRecordsRecords", Aggregation::Average),
    metric("PutRecords.Success", "PutRecordsSuccess", Aggregation::Average),
    metric("ReadProvisionedThroughputExceeded", "ReadThroughputExceeded", Aggregation::Average),
    metric("WriteProvisionedThroughputExceeded", "WriteThroughputExceeded", Aggregation::Average),
];
