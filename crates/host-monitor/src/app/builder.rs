use std::sync::Arc;

use anyhow::Result;
use collector_client::CollectorTransport;
use collector_client::HttpTransport;
use collector_client::KerberosCommandAuthenticator;

use crate::app::core::Application;
use crate::app::services::ApplicationServices;
use crate::app::tasks::TaskSettings;
use crate::blacklist::BlacklistedSet;
use crate::collector::MetricsCollector;
use crate::config::AgentArgs;
use crate::emitter::Emitter;
use crate::host_info::HostSampler;
use crate::host_info::SysinfoHostInfo;
use crate::instance_type::detect_instance_type;
use crate::instance_type::InstanceTypeConfig;
use crate::metering::MeteringConfig;
use crate::metering::MeteringHandler;
use crate::metric_map::ApplicationMetricMap;
use crate::stop::StopSignal;

const FALLBACK_HOSTNAME: &str = "localhost";

/// Application builder
pub struct ApplicationBuilder {
    agent_args: AgentArgs,
    sampler: Option<Box<dyn HostSampler>>,
    transport: Option<Arc<dyn CollectorTransport>>,
    bind_signals: bool,
}

impl ApplicationBuilder {
    pub fn new(agent_args: AgentArgs) -> Self {
        Self {
            agent_args,
            sampler: None,
            transport: None,
            bind_signals: true,
        }
    }

    /// Samples through `sampler` instead of the OS.
    pub fn with_sampler(mut self, sampler: Box<dyn HostSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Delivers through `transport` instead of HTTP.
    pub fn with_transport(mut self, transport: Arc<dyn CollectorTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Leaves process signals alone; stopping is up to the caller.
    pub fn without_signal_handlers(mut self) -> Self {
        self.bind_signals = false;
        self
    }

    /// Build complete application
    pub fn build(self) -> Result<Application> {
        tracing::info!("Building application components...");
        let args = &self.agent_args;

        let timers = args
            .group_timers()
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;

        let hosts = Arc::new(BlacklistedSet::new(
            args.collector_hosts
                .iter()
                .map(|host| host.trim())
                .filter(|host| !host.is_empty()),
            args.blacklist_ttl(),
        ));
        if hosts.candidate_count() == 0 {
            anyhow::bail!("no collector hosts configured");
        }

        let hostname = args
            .hostname
            .clone()
            .or_else(SysinfoHostInfo::host_name)
            .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string());
        tracing::info!(%hostname, hosts = ?hosts.candidates(), "Agent identity resolved");

        let stop = StopSignal::new();
        let metric_map = Arc::new(
            ApplicationMetricMap::new(hostname.clone()).with_instance_id(args.instance_id.clone()),
        );

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpTransport::new(args.client_config())
                    .map_err(|e| anyhow::anyhow!("Failed to create collector client: {e:?}"))?,
            ),
        };
        let mut emitter = Emitter::new(
            args.emitter_config(),
            hosts.clone(),
            metric_map.clone(),
            transport,
            stop.clone(),
        );
        if let Some(negotiate) = args.negotiate_config() {
            emitter = emitter.with_authenticator(Arc::new(KerberosCommandAuthenticator::new(negotiate)));
        }

        let sampler = self
            .sampler
            .unwrap_or_else(|| Box::new(SysinfoHostInfo::new()));
        let mut collector = MetricsCollector::new(sampler, metric_map.clone(), stop.clone());
        if args.metering_enabled {
            let instance_type =
                detect_instance_type(&InstanceTypeConfig::from(&args.instance_type));
            collector = collector.with_metering(Arc::new(MeteringHandler::new(MeteringConfig {
                app_id: args.metering_app_id.clone(),
                hostname,
                instance_type,
                metric_names: args.metering_metrics.clone(),
            })));
        }

        let settings = TaskSettings {
            event_queue_capacity: args.event_queue_capacity,
            event_poll_interval: args.event_poll_interval(),
            bind_signals: self.bind_signals,
        };
        let services = ApplicationServices {
            stop,
            metric_map,
            emitter: Arc::new(emitter),
            collector,
            timers,
        };
        Ok(Application::new(services, settings))
    }
}
