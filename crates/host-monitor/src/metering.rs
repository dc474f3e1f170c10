//! Metering metrics derived from host samples.

use std::collections::HashSet;

use api_types::MetricValue;
use api_types::MetricValues;

use crate::now_millis;

const ALIVE_TIME_SUFFIX: &str = "lastKnownAliveTime";

/// Default metering application id.
pub const DEFAULT_METERING_APP_ID: &str = "HOST_METERING";

/// Derives auxiliary samples from a freshly collected host sample.
pub trait MeteringSource: Send + Sync {
    /// App id derived metering samples are filed under.
    fn app_id(&self) -> &str;

    /// App id the instance type indicator is filed under.
    fn instance_type_app_id(&self) -> &str;

    /// Metering samples for `metrics`; may be empty.
    fn metering_metrics(&self, metrics: &MetricValues) -> MetricValues;

    /// Static `{instance_type: 1}` indicator.
    fn instance_type_metrics(&self) -> MetricValues;
}

#[derive(Debug, Clone)]
pub struct MeteringConfig {
    pub app_id: String,
    pub hostname: String,
    pub instance_type: String,
    /// Host metrics that are metered
    pub metric_names: Vec<String>,
}

/// Records "still alive with this value" markers for metered metrics.
///
/// Each marker key is `host~instance_type~start~metric~value~lastKnownAliveTime`
/// and its value the time it was last seen, so the collector can compute how
/// long a host ran with a given shape.
#[derive(Debug)]
pub struct MeteringHandler {
    app_id: String,
    instance_type_app_id: String,
    instance_type: String,
    metered: HashSet<String>,
    key_prefix: String,
}

impl MeteringHandler {
    pub fn new(config: MeteringConfig) -> Self {
        let start_ts = now_millis();
        let key_prefix = format!("{}~{}~{start_ts}", config.hostname, config.instance_type);
        tracing::info!(
            app_id = %config.app_id,
            metrics = ?config.metric_names,
            start_ts,
            "Metering started"
        );
        Self {
            instance_type_app_id: format!("{}_instance_type", config.app_id),
            app_id: config.app_id,
            instance_type: config.instance_type,
            metered: config.metric_names.into_iter().collect(),
            key_prefix,
        }
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}

impl MeteringSource for MeteringHandler {
    fn app_id(&self) -> &str {
        &self.app_id
    }

    fn instance_type_app_id(&self) -> &str {
        &self.instance_type_app_id
    }

    fn metering_metrics(&self, metrics: &MetricValues) -> MetricValues {
        let now = now_millis();
        metrics
            .iter()
            .filter(|(name, _)| self.metered.contains(name.as_str()))
            .map(|(name, value)| {
                (
                    format!("{}~{name}~{value}~{ALIVE_TIME_SUFFIX}", self.key_prefix),
                    MetricValue::from(now),
                )
            })
            .collect()
    }

    fn instance_type_metrics(&self) -> MetricValues {
        MetricValues::from([(self.instance_type.clone(), MetricValue::Integer(1))])
    }
}
