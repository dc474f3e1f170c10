//! Periodic delivery of buffered metrics to the collector hosts.
//!
//! Each cycle drains the [`ApplicationMetricMap`], picks a collector host
//! round-robin among the ones not blacklisted and posts the batch. Failed
//! hosts are blacklisted and the next one is tried until the retry budget is
//! spent. A `401 Negotiate` answer triggers a SPNEGO handshake and one resend
//! to the same host. Whatever could not be delivered is put back into the map
//! for the next cycle.

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use collector_client::cookie::hadoop_auth_cookie;
use collector_client::encode_payload;
use collector_client::Authenticator;
use collector_client::CollectorTransport;
use collector_client::CommError;
use collector_client::CommResult;
use collector_client::SubmitHeaders;
use collector_client::SubmitResponse;
use error_stack::Report;

use crate::blacklist::BlacklistedSet;
use crate::metric_map::ApplicationMetricMap;
use crate::stop::StopSignal;

pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRY_SLEEP: Duration = Duration::from_secs(5);

/// Timing and retry settings of the [`Emitter`].
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    pub send_interval: Duration,
    /// Pause between two attempts of the same cycle
    pub retry_sleep: Duration,
    /// Attempts per cycle; capped by, and defaulting to, the number of
    /// candidate hosts
    pub max_retries: Option<usize>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            send_interval: DEFAULT_SEND_INTERVAL,
            retry_sleep: DEFAULT_RETRY_SLEEP,
            max_retries: None,
        }
    }
}

/// How a delivery cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was buffered.
    Empty,
    Delivered { host: String },
    /// Every candidate host was blacklisted before the first attempt.
    NoHostAvailable,
    RetriesExhausted,
    /// The stop signal was set mid-cycle.
    Aborted,
    /// The batch could not be serialized.
    Unencodable,
}

impl CycleOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, CycleOutcome::Delivered { .. })
    }
}

/// What happened during one [`Emitter::submit_metrics`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Attempts counted against the retry budget
    pub attempts: usize,
    pub handshakes: usize,
    /// Buffered points taken in this cycle
    pub points: usize,
}

impl CycleReport {
    fn new(points: usize) -> Self {
        Self {
            outcome: CycleOutcome::Empty,
            attempts: 0,
            handshakes: 0,
            points,
        }
    }
}

pub struct Emitter {
    config: EmitterConfig,
    hosts: Arc<BlacklistedSet>,
    metric_map: Arc<ApplicationMetricMap>,
    transport: Arc<dyn CollectorTransport>,
    authenticator: Option<Arc<dyn Authenticator>>,
    stop: StopSignal,
    cursor: AtomicUsize,
    cookies: Mutex<HashMap<String, String>>,
}

impl Emitter {
    pub fn new(
        config: EmitterConfig,
        hosts: Arc<BlacklistedSet>,
        metric_map: Arc<ApplicationMetricMap>,
        transport: Arc<dyn CollectorTransport>,
        stop: StopSignal,
    ) -> Self {
        Self {
            config,
            hosts,
            metric_map,
            transport,
            authenticator: None,
            stop,
            cursor: AtomicUsize::new(0),
            cookies: Mutex::new(HashMap::new()),
        }
    }

    /// Answers `401 Negotiate` challenges with `authenticator`.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Attempts allowed per cycle.
    pub fn retry_limit(&self) -> usize {
        let candidates = self.hosts.candidate_count();
        self.config
            .max_retries
            .map_or(candidates, |max| max.min(candidates))
            .max(1)
    }

    /// Submits once per send interval until the stop signal is set.
    pub async fn run(&self) {
        tracing::info!(
            interval = ?self.config.send_interval,
            hosts = ?self.hosts.candidates(),
            "Emitter started"
        );
        loop {
            let report = self.submit_metrics().await;
            tracing::debug!(?report, "Emit cycle finished");
            if self.stop.wait(self.config.send_interval).await.is_stopped() {
                break;
            }
        }
        tracing::info!("Emitter stopped");
    }

    /// Runs one delivery cycle.
    ///
    /// On any outcome other than delivery the drained samples are restored.
    pub async fn submit_metrics(&self) -> CycleReport {
        let snapshot = self.metric_map.drain();
        let mut report = CycleReport::new(snapshot.point_count());
        if snapshot.is_empty() {
            tracing::debug!("No metrics to send");
            return report;
        }

        report.outcome = match encode_payload(&self.metric_map.flatten(&snapshot)) {
            Ok(body) => self.deliver(&body, &mut report).await,
            Err(e) => {
                tracing::error!(error = ?e, "Failed to encode metrics");
                CycleOutcome::Unencodable
            }
        };

        if !report.outcome.is_delivered() {
            tracing::info!(
                points = report.points,
                outcome = ?report.outcome,
                "Keeping undelivered metrics for the next cycle"
            );
            self.metric_map.restore(snapshot);
        }
        report
    }

    async fn deliver(&self, body: &str, report: &mut CycleReport) -> CycleOutcome {
        let retry_limit = self.retry_limit();
        loop {
            if self.stop.is_set() {
                return CycleOutcome::Aborted;
            }
            let Some(host) = self.select_host() else {
                if report.attempts > 0 {
                    tracing::error!(
                        attempts = report.attempts,
                        "Failed to send metrics, no collector host left to try"
                    );
                    return CycleOutcome::RetriesExhausted;
                }
                tracing::warn!("No collector host available, all hosts are blacklisted");
                return CycleOutcome::NoHostAvailable;
            };

            report.attempts += 1;
            match self.send_to_host(&host, body, report).await {
                Ok(()) => {
                    self.cursor.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(host = %host, points = report.points, "Metrics delivered");
                    return CycleOutcome::Delivered { host };
                }
                Err(e) if matches!(e.current_context(), CommError::Interrupted) => {
                    tracing::info!(host = %host, "Delivery interrupted by shutdown");
                    return CycleOutcome::Aborted;
                }
                Err(e) => {
                    tracing::warn!(
                        host = %host,
                        attempt = report.attempts,
                        error = ?e,
                        "Failed to send metrics, blacklisting host"
                    );
                    self.hosts.blacklist(&host);
                }
            }

            if report.attempts >= retry_limit {
                tracing::error!(
                    attempts = report.attempts,
                    "Failed to send metrics to any collector host"
                );
                return CycleOutcome::RetriesExhausted;
            }
            if self.stop.wait(self.config.retry_sleep).await.is_stopped() {
                return CycleOutcome::Aborted;
            }
        }
    }

    fn select_host(&self) -> Option<String> {
        let available = self.hosts.available();
        if available.is_empty() {
            return None;
        }
        let index = self.cursor.load(Ordering::Relaxed) % available.len();
        available.into_iter().nth(index)
    }

    async fn send_to_host(
        &self,
        host: &str,
        body: &str,
        report: &mut CycleReport,
    ) -> CommResult<()> {
        let headers = SubmitHeaders {
            authorization: None,
            cookie: self.cached_cookie(host),
        };
        let response = self.transport.submit(host, body, &headers).await?;
        if response.is_success() {
            self.remember_cookie(host, &response);
            return Ok(());
        }

        let Some(challenge) = response.negotiate_challenge() else {
            return Err(unexpected_status(&response));
        };
        self.forget_cookie(host);
        let Some(authenticator) = &self.authenticator else {
            return Err(Report::new(CommError::Authentication {
                message: format!("{host} requires SPNEGO but no authenticator is configured"),
            }));
        };

        tracing::info!(host = %host, "Collector requested SPNEGO authentication");
        report.handshakes += 1;
        let credential = authenticator.handshake(host, challenge).await?;
        if self.stop.is_set() {
            return Err(Report::new(CommError::Interrupted));
        }

        let headers = SubmitHeaders {
            authorization: Some(credential.header_value().to_string()),
            cookie: None,
        };
        let response = self.transport.submit(host, body, &headers).await?;
        if !response.is_success() {
            return Err(unexpected_status(&response));
        }
        self.remember_cookie(host, &response);
        Ok(())
    }

    fn cached_cookie(&self, host: &str) -> Option<String> {
        self.cookies.lock().expect("poisoned").get(host).cloned()
    }

    fn remember_cookie(&self, host: &str, response: &SubmitResponse) {
        if let Some(cookie) = hadoop_auth_cookie(response.set_cookie.iter().map(String::as_str)) {
            tracing::debug!(host = %host, "Caching collector auth cookie");
            self.cookies
                .lock()
                .expect("poisoned")
                .insert(host.to_string(), cookie);
        }
    }

    fn forget_cookie(&self, host: &str) {
        self.cookies.lock().expect("poisoned").remove(host);
    }
}

fn unexpected_status(response: &SubmitResponse) -> Report<CommError> {
    Report::new(CommError::UnexpectedStatus {
        status: response.status,
    })
}
