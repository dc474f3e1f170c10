//! client config
//!
//! Describes how a collector host identifier is turned into a request URL and
//! how long a single submission may take.

use std::time::Duration;

use error_stack::Report;
use url::Url;

use crate::error::CommError;
use crate::error::CommResult;

/// Default collector port.
pub const DEFAULT_COLLECTOR_PORT: u16 = 6188;
/// Default path metrics are POSTed to.
pub const DEFAULT_METRICS_PATH: &str = "/ws/v1/timeline/metrics";

/// URL scheme used to reach collector hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Protocol {
    #[display("http")]
    Http,
    #[display("https")]
    Https,
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(format!("unsupported collector protocol '{other}'")),
        }
    }
}

/// Collector client config.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// scheme for hosts given without one
    pub protocol: Protocol,
    /// port for hosts given without one
    pub port: u16,
    /// path metrics are posted to
    pub metrics_path: String,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// create new client config with default parameters.
    pub fn new() -> Self {
        Self {
            protocol: Protocol::Http,
            port: DEFAULT_COLLECTOR_PORT,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// set protocol.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// set default port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// set metrics path.
    pub fn with_metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }

    /// set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builds the submission URL for a collector host.
    ///
    /// `host` may be a bare name (`c6401`), a `name:port` pair or a full base
    /// URL (`https://c6401:6189`); missing parts come from this config.
    pub fn metrics_url(&self, host: &str) -> CommResult<Url> {
        let host = host.trim();
        if host.is_empty() {
            return Err(Report::new(CommError::Configuration {
                message: "empty collector host".into(),
            }));
        }

        let base = if host.contains("://") {
            host.to_string()
        } else if has_port(host) {
            format!("{}://{host}", self.protocol)
        } else {
            format!("{}://{host}:{}", self.protocol, self.port)
        };

        let mut url = Url::parse(&base).map_err(|e| {
            Report::new(CommError::Configuration {
                message: format!("invalid collector host '{host}': {e}"),
            })
        })?;
        url.set_path(&self.metrics_path);
        Ok(url)
    }
}

fn has_port(host: &str) -> bool {
    host.rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
}

/// Host name part of a collector host identifier, without scheme or port.
pub fn host_name(host: &str) -> &str {
    let host = host.trim();
    let host = host.split_once("://").map_or(host, |(_, rest)| rest);
    let host = host.split('/').next().unwrap_or(host);
    if has_port(host) {
        host.rsplit_once(':').map_or(host, |(name, _)| name)
    } else {
        host
    }
}
