//! Shared API type definitions
//!
//! This crate contains the wire types exchanged between the host monitoring
//! agent and the metrics collector service: individual metric values, the
//! per-metric timeline record and the batch envelope that is POSTed to a
//! collector host.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Mapping from metric name to its sampled value.
pub type MetricValues = BTreeMap<String, MetricValue>;

/// A single sampled value.
///
/// Samplers report counters as integers, ratios as floats and a few
/// descriptive metrics (such as an instance type) as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v}"),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::from(value as u64)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        MetricValue::Float(f64::from(value))
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

/// One metric of one application, with all of its buffered samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineMetric {
    /// Reporting host name
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hostname: Option<String>,
    /// Metric name, e.g. `cpu_idle`
    pub metricname: String,
    /// Application identifier the metric belongs to, e.g. `_HOST`
    pub appid: String,
    /// Instance identifier, only sent when instance ids are enabled
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instanceid: Option<String>,
    /// Earliest sample timestamp in epoch milliseconds
    pub starttime: u64,
    /// Samples keyed by their epoch millisecond timestamp
    pub metrics: BTreeMap<u64, MetricValue>,
}

/// Batch envelope POSTed to the collector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimelineMetrics {
    pub metrics: Vec<TimelineMetric>,
}

impl TimelineMetrics {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Total number of data points across all metrics.
    pub fn point_count(&self) -> usize {
        self.metrics.iter().map(|m| m.metrics.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_metrics_wire_format() {
        let payload = TimelineMetrics {
            metrics: vec![TimelineMetric {
                hostname: Some("host1".to_string()),
                metricname: "metric1".to_string(),
                appid: "APP1".to_string(),
                instanceid: None,
                starttime: 1,
                metrics: BTreeMap::from([(1, MetricValue::Integer(1))]),
            }],
        };

        let json = serde_json::to_value(&payload).expect("should serialize payload");
        assert_eq!(
            json,
            serde_json::json!({
                "metrics": [{
                    "hostname": "host1",
                    "metricname": "metric1",
                    "appid": "APP1",
                    "starttime": 1,
                    "metrics": {"1": 1}
                }]
            })
        );
    }

    #[test]
    fn metric_value_keeps_integer_and_float_apart() {
        let values: MetricValues =
            serde_json::from_str(r#"{"a": 3, "b": 2.5, "c": "m5.large"}"#)
                .expect("should deserialize metric values");

        assert_eq!(values["a"], MetricValue::Integer(3));
        assert_eq!(values["b"], MetricValue::Float(2.5));
        assert_eq!(values["c"], MetricValue::Text("m5.large".to_string()));
        assert_eq!(values["c"].to_string(), "m5.large");
    }
}
