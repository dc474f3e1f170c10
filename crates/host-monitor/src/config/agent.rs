use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use clap::Parser;
use collector_client::config::DEFAULT_COLLECTOR_PORT;
use collector_client::config::DEFAULT_METRICS_PATH;
use collector_client::ClientConfig;
use collector_client::NegotiateConfig;
use collector_client::Protocol;
use error_stack::Report;
use serde::Deserialize;
use serde::Deserializer;

use crate::emitter::EmitterConfig;
use crate::error::AgentError;
use crate::error::AgentResult;
use crate::event::MetricGroup;
use crate::instance_type::InstanceTypeConfig;
use crate::timers::GroupTimer;

/// Collection interval in seconds, given either as a number or a string.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
struct IntervalSecs(#[serde(deserialize_with = "deserialize_f64_from_string")] f64);

/// Accepts both `10` and `"10"`, as written by configuration tooling that
/// stringifies every value.
fn deserialize_f64_from_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    match StringOrFloat::deserialize(deserializer)? {
        StringOrFloat::String(s) => s.trim().parse::<f64>().map_err(|e| {
            serde::de::Error::custom(format!("Failed to parse float from string '{s}': {e}"))
        }),
        StringOrFloat::Float(f) => Ok(f),
    }
}

/// Parses a metric group schedule such as `{"cpu": 10, "disk": "60"}`.
///
/// # Errors
///
/// - [`AgentError::Config`] if the JSON is malformed or an interval is not
///   a positive number of seconds
pub fn parse_metric_groups(json: &str) -> AgentResult<Vec<GroupTimer>> {
    let groups: BTreeMap<String, IntervalSecs> =
        serde_json::from_str(json).map_err(|e| {
            Report::new(AgentError::Config {
                message: format!("invalid metric groups '{json}': {e}"),
            })
        })?;

    groups
        .into_iter()
        .map(|(name, IntervalSecs(secs))| {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(Report::new(AgentError::Config {
                    message: format!("interval for metric group '{name}' must be positive, got {secs}"),
                }));
            }
            let interval = Duration::try_from_secs_f64(secs).map_err(|e| {
                Report::new(AgentError::Config {
                    message: format!("interval for metric group '{name}' is out of range: {e}"),
                })
            })?;
            Ok(GroupTimer::new(MetricGroup::from(name.as_str()), interval))
        })
        .collect()
}

#[derive(Args, Clone, Debug)]
pub struct InstanceTypeArgs {
    #[arg(
        long,
        env = "HOST_MONITOR_PROVIDER_TYPE",
        help = "Platform provider type, e.g. google, microsoft or xen"
    )]
    pub provider_type: Option<String>,

    #[arg(
        long,
        env = "HOST_MONITOR_CONF_DIR",
        value_hint = clap::ValueHint::DirPath,
        default_value = "/etc/ambari-metrics-monitor/conf",
        help = "Directory holding the instance_type_provider_* scripts"
    )]
    pub config_dir: PathBuf,

    #[arg(
        long,
        env = "HOST_MONITOR_INSTANCE_TYPE_SCRIPT",
        value_hint = clap::ValueHint::FilePath,
        help = "Script printing the instance type when no provider script applies"
    )]
    pub instance_type_script: Option<PathBuf>,
}

impl From<&InstanceTypeArgs> for InstanceTypeConfig {
    fn from(args: &InstanceTypeArgs) -> Self {
        Self {
            config_dir: args.config_dir.clone(),
            provider_type: args.provider_type.clone(),
            instance_type_script: args.instance_type_script.clone(),
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct AgentArgs {
    #[arg(
        long,
        env = "METRICS_COLLECTOR_HOSTS",
        value_delimiter = ',',
        required = true,
        help = "Comma separated collector hosts, each a host, host:port or URL"
    )]
    pub collector_hosts: Vec<String>,

    #[arg(
        long,
        env = "METRICS_COLLECTOR_PROTOCOL",
        default_value = "http",
        help = "Protocol for collector hosts given without a scheme"
    )]
    pub collector_protocol: Protocol,

    #[arg(
        long,
        env = "METRICS_COLLECTOR_PORT",
        default_value_t = DEFAULT_COLLECTOR_PORT,
        help = "Port for collector hosts given without one"
    )]
    pub collector_port: u16,

    #[arg(long, default_value = DEFAULT_METRICS_PATH, help = "Path metrics are posted to")]
    pub metrics_path: String,

    #[arg(
        long,
        env = "HOST_MONITOR_SEND_INTERVAL",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between two delivery cycles"
    )]
    pub send_interval_secs: u64,

    #[arg(
        long,
        help = "Delivery attempts per cycle, capped by the number of collector hosts"
    )]
    pub max_retries: Option<usize>,

    #[arg(long, default_value_t = 5, help = "Seconds between two delivery attempts")]
    pub retry_sleep_secs: u64,

    #[arg(
        long,
        default_value_t = 300,
        help = "Seconds a failed collector host is skipped"
    )]
    pub blacklist_ttl_secs: u64,

    #[arg(long, default_value_t = 5, help = "HTTP request timeout in seconds")]
    pub request_timeout_secs: u64,

    #[arg(
        long,
        env = "HOST_MONITOR_HOSTNAME",
        help = "Host name reported with every metric (defaults to the OS host name)"
    )]
    pub hostname: Option<String>,

    #[arg(
        long,
        env = "HOST_MONITOR_INSTANCE_ID",
        help = "Instance id reported with every metric"
    )]
    pub instance_id: Option<String>,

    #[arg(
        long,
        env = "HOST_MONITOR_METRIC_GROUPS",
        default_value = r#"{"all": 10}"#,
        help = "JSON map of metric group to collection interval in seconds"
    )]
    pub metric_groups: String,

    #[arg(
        long,
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Milliseconds an idle event consumer waits before re-checking for shutdown"
    )]
    pub event_poll_interval_ms: u64,

    #[arg(long, default_value_t = 64, help = "Capacity of the collection event queue")]
    pub event_queue_capacity: usize,

    #[arg(
        long,
        env = "HOST_MONITOR_METERING",
        default_value_t = false,
        action = clap::ArgAction::Set,
        help = "Record host metering metrics"
    )]
    pub metering_enabled: bool,

    #[arg(long, default_value = crate::metering::DEFAULT_METERING_APP_ID)]
    pub metering_app_id: String,

    #[arg(
        long,
        value_delimiter = ',',
        default_value = "cpu_num,mem_total",
        help = "Comma separated host metrics to meter"
    )]
    pub metering_metrics: Vec<String>,

    #[command(flatten)]
    pub instance_type: InstanceTypeArgs,

    #[arg(
        long,
        env = "HOST_MONITOR_NEGOTIATE_CMD",
        help = "Command printing a base64 SPNEGO token; enables Kerberos authentication"
    )]
    pub negotiate_token_cmd: Option<String>,

    #[arg(
        long,
        env = "HOST_MONITOR_KINIT_CMD",
        help = "Command refreshing the Kerberos ticket before each handshake"
    )]
    pub kinit_cmd: Option<String>,

    #[arg(long, default_value_t = 10, help = "Timeout in seconds for Kerberos commands")]
    pub auth_command_timeout_secs: u64,

    #[arg(
        long,
        env = "HOST_MONITOR_LOG_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Also write logs to this file, rotated daily"
    )]
    pub log_file: Option<PathBuf>,
}

impl AgentArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_protocol(self.collector_protocol)
            .with_port(self.collector_port)
            .with_metrics_path(self.metrics_path.clone())
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }

    pub fn emitter_config(&self) -> EmitterConfig {
        EmitterConfig {
            send_interval: Duration::from_secs(self.send_interval_secs),
            retry_sleep: Duration::from_secs(self.retry_sleep_secs),
            max_retries: self.max_retries,
        }
    }

    /// `None` unless a negotiate token command is configured.
    pub fn negotiate_config(&self) -> Option<NegotiateConfig> {
        let token_cmd = self.negotiate_token_cmd.clone()?;
        Some(NegotiateConfig {
            kinit_cmd: self.kinit_cmd.clone(),
            token_cmd,
            command_timeout: Duration::from_secs(self.auth_command_timeout_secs),
        })
    }

    pub fn blacklist_ttl(&self) -> Duration {
        Duration::from_secs(self.blacklist_ttl_secs)
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    pub fn group_timers(&self) -> AgentResult<Vec<GroupTimer>> {
        parse_metric_groups(&self.metric_groups)
    }
}
