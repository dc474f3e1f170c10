//! HTTP transport to collector hosts.
//!
//! A [`CollectorTransport`] performs exactly one POST per call and reports the
//! raw outcome. Retry, failover and authentication decisions belong to the
//! caller.

use api_types::TimelineMetrics;
use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use reqwest::header::ACCEPT;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::COOKIE;
use reqwest::header::SET_COOKIE;
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::Client;
use tracing::debug;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::CommError;
use crate::error::CommResult;
use crate::negotiate::is_negotiate_challenge;

/// Optional headers attached to a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitHeaders {
    /// `Authorization` value, e.g. `Negotiate <token>`
    pub authorization: Option<String>,
    /// `Cookie` value, e.g. a cached `hadoop.auth=...`
    pub cookie: Option<String>,
}

/// Outcome of a single POST that reached the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitResponse {
    pub status: u16,
    /// `WWW-Authenticate` header value, if any
    pub www_authenticate: Option<String>,
    /// all `Set-Cookie` header values
    pub set_cookie: Vec<String>,
}

impl SubmitResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Delivery succeeded. Only a plain 200 counts.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// The SPNEGO challenge when this is a `401` asking for `Negotiate`.
    pub fn negotiate_challenge(&self) -> Option<&str> {
        if self.status != 401 {
            return None;
        }
        self.www_authenticate
            .as_deref()
            .filter(|value| is_negotiate_challenge(value))
    }
}

/// Sends serialized metric batches to a collector host.
#[async_trait]
pub trait CollectorTransport: Send + Sync {
    /// POST `body` to `host`.
    ///
    /// # Errors
    ///
    /// Returns an error only when no HTTP response was obtained (connection
    /// refused, reset, timeout, bad host). Any status code is an `Ok`.
    async fn submit(
        &self,
        host: &str,
        body: &str,
        headers: &SubmitHeaders,
    ) -> CommResult<SubmitResponse>;
}

/// Serializes a batch to the JSON body expected by the collector.
pub fn encode_payload(payload: &TimelineMetrics) -> CommResult<String> {
    serde_json::to_string(payload).change_context(CommError::Serialization {
        message: "Failed to serialize metrics payload".into(),
    })
}

/// reqwest backed transport
pub struct HttpTransport {
    config: ClientConfig,
    http: Client,
}

impl HttpTransport {
    /// create transport
    pub fn new(config: ClientConfig) -> CommResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .change_context(CommError::Configuration {
                message: "Failed to create HTTP client for collector".into(),
            })?;

        info!(
            protocol = %config.protocol,
            port = config.port,
            path = %config.metrics_path,
            "Collector HTTP transport created"
        );

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl CollectorTransport for HttpTransport {
    async fn submit(
        &self,
        host: &str,
        body: &str,
        headers: &SubmitHeaders,
    ) -> CommResult<SubmitResponse> {
        let url = self.config.metrics_url(host)?;
        debug!(url = %url, bytes = body.len(), "Submitting metrics");

        let mut request = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "*/*")
            .body(body.to_owned());
        if let Some(authorization) = &headers.authorization {
            request = request.header(AUTHORIZATION, authorization);
        }
        if let Some(cookie) = &headers.cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| {
            let context = if e.is_timeout() {
                CommError::Timeout {
                    seconds: self.config.request_timeout.as_secs(),
                }
            } else {
                CommError::Network {
                    message: format!("Failed to reach collector {host}"),
                }
            };
            Report::new(e).change_context(context)
        })?;

        let status = response.status().as_u16();
        let www_authenticate = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let set_cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        debug!(url = %url, status, "Collector responded");

        Ok(SubmitResponse {
            status,
            www_authenticate,
            set_cookie,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_200_is_success() {
        assert!(SubmitResponse::new(200).is_success());
        assert!(!SubmitResponse::new(201).is_success());
        assert!(!SubmitResponse::new(204).is_success());
    }

    #[test]
    fn negotiate_challenge_requires_401() {
        let mut response = SubmitResponse::new(401);
        response.www_authenticate = Some("Negotiate   ".to_string());
        assert_eq!(response.negotiate_challenge(), Some("Negotiate   "));

        response.status = 403;
        assert_eq!(response.negotiate_challenge(), None);

        let mut basic = SubmitResponse::new(401);
        basic.www_authenticate = Some("Basic realm=\"ams\"".to_string());
        assert_eq!(basic.negotiate_challenge(), None);

        assert_eq!(SubmitResponse::new(401).negotiate_challenge(), None);
    }

    #[test]
    fn encode_payload_produces_collector_json() {
        let payload = TimelineMetrics::default();
        let body = encode_payload(&payload).expect("should encode payload");
        assert_eq!(body, r#"{"metrics":[]}"#);
    }
}
