//! CloudWatch Embedded Metric Format sink
//!
//! Writes one EMF document per metric point, newline terminated:
//!
//! ```json
//! {"_aws":{"Timestamp":1700000040000,"CloudWatchMetrics":[{"Namespace":"CloudFront by Edge Location - Count",
//!   "Dimensions":[["cs-host","x-edge-location"]],"Metrics":[{"Name":"2xx","Unit":"Count","StorageResolution":1}]}]},
//!  "cs-host":"d1.cloudfront.net","x-edge-location":"IAD89-C1","2xx":42.0}
//! ```
//!
//! On Lambda the documents go to stdout and the platform turns them into metrics.

use super::{MetricPoint, MetricsSink};
use crate::error::SinkError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;

#[derive(Serialize)]
struct Metadata<'a> {
    #[serde(rename = "Timestamp")]
    timestamp: i64,
    #[serde(rename = "CloudWatchMetrics")]
    cloudwatch_metrics: [MetricDirective<'a>; 1],
}

#[derive(Serialize)]
struct MetricDirective<'a> {
    #[serde(rename = "Namespace")]
    namespace: &'a str,
    #[serde(rename = "Dimensions")]
    dimensions: [Vec<&'a str>; 1],
    #[serde(rename = "Metrics")]
    metrics: [MetricDefinition<'a>; 1],
}

#[derive(Serialize)]
struct MetricDefinition<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Unit")]
    unit: &'a str,
    #[serde(rename = "StorageResolution")]
    storage_resolution: u32,
}

/// Render one point as an EMF document
pub fn render(point: &MetricPoint) -> Result<Value, serde_json::Error> {
    let metadata = Metadata {
        timestamp: point.timestamp.timestamp_millis(),
        cloudwatch_metrics: [MetricDirective {
            namespace: &point.namespace,
            dimensions: [point.dimensions.iter().map(|(name, _)| name.as_str()).collect()],
            metrics: [MetricDefinition {
                name: &point.name,
                unit: point.unit.as_str(),
                storage_resolution: point.resolution.seconds(),
            }],
        }],
    };

    let mut document = Map::new();
    document.insert("_aws".to_string(), serde_json::to_value(&metadata)?);
    for (name, value) in &point.dimensions {
        document.insert(name.clone(), Value::String(value.clone()));
    }
    document.insert(point.name.clone(), serde_json::to_value(point.value)?);
    Ok(Value::Object(document))
}

/// EMF sink over any writer (stdout, a file, a buffer)
pub struct EmfSink<W: Write + Send> {
    out: W,
    written: u64,
}

impl<W: Write + Send> EmfSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn error(point: &MetricPoint, source: impl Into<crate::error::BoxError>) -> SinkError {
        SinkError {
            namespace: point.namespace.clone(),
            metric: point.name.clone(),
            source: source.into(),
        }
    }
}

#[async_trait]
impl<W: Write + Send> MetricsSink for EmfSink<W> {
    async fn put_metric(&mut self, point: &MetricPoint) -> Result<(), SinkError> {
        let document = render(point).map_err(|e| Self::error(point, e))?;
        serde_json::to_writer(&mut self.out, &document).map_err(|e| Self::error(point, e))?;
        self.out
            .write_all(b"\n")
            .map_err(|e| Self::error(point, e))?;
        self.written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.out.flush().map_err(|e| SinkError {
            namespace: String::new(),
            metric: String::new(),
            source: e.into(),
        })
    }

    fn backend_type(&self) -> &'static str {
        "EMF"
    }
}
