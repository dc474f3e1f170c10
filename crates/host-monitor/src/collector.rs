//! Event consumer turning collection events into buffered samples.

use std::sync::Arc;
use std::time::Duration;

use api_types::MetricValues;
use tokio::sync::mpsc;

use crate::event::CollectionEvent;
use crate::event::EventKind;
use crate::event::MetricGroup;
use crate::host_info::HostSampler;
use crate::metering::MeteringSource;
use crate::metric_map::ApplicationMetricMap;
use crate::metric_map::DEFAULT_HOST_APP_ID;
use crate::now_millis;
use crate::stop::StopSignal;

/// Pulls events off the queue and samples the requested metric group.
pub struct MetricsCollector {
    sampler: Box<dyn HostSampler>,
    metric_map: Arc<ApplicationMetricMap>,
    metering: Option<Arc<dyn MeteringSource>>,
    stop: StopSignal,
}

impl MetricsCollector {
    pub fn new(
        sampler: Box<dyn HostSampler>,
        metric_map: Arc<ApplicationMetricMap>,
        stop: StopSignal,
    ) -> Self {
        Self {
            sampler,
            metric_map,
            metering: None,
            stop,
        }
    }

    /// Also record metering samples for every host sample.
    pub fn with_metering(mut self, metering: Arc<dyn MeteringSource>) -> Self {
        self.metering = Some(metering);
        self
    }

    /// Consumes events until the stop signal is set or every sender is gone.
    ///
    /// An idle queue is re-checked every `poll_interval`.
    pub async fn run(mut self, mut events: mpsc::Receiver<CollectionEvent>, poll_interval: Duration) {
        let stop = self.stop.clone();
        loop {
            let event = tokio::select! {
                outcome = stop.wait(poll_interval) => {
                    if outcome.is_stopped() {
                        break;
                    }
                    continue;
                }
                event = events.recv() => event,
            };

            match event {
                Some(event) => {
                    self.process_event(&event, now_millis());
                }
                None => {
                    tracing::info!("Collection event queue closed");
                    break;
                }
            }
        }
        tracing::info!("Metrics collector stopped");
    }

    /// Handles one event sampled at `timestamp` (epoch ms).
    ///
    /// Returns `true` when something was written to the metric map.
    pub fn process_event(&mut self, event: &CollectionEvent, timestamp: u64) -> bool {
        match event.kind {
            EventKind::HostLevel => self.process_host_event(&event.group, timestamp),
            EventKind::ProcessLevel => {
                tracing::trace!(group = %event.group, "Ignoring process level event");
                false
            }
        }
    }

    fn process_host_event(&mut self, group: &MetricGroup, timestamp: u64) -> bool {
        let Some(metrics) = self.collect(group) else {
            tracing::warn!(group = %group, "Unknown metric group, discarding event");
            return false;
        };
        if metrics.is_empty() {
            tracing::debug!(group = %group, "Sampler returned no metrics");
            return false;
        }

        tracing::debug!(group = %group, count = metrics.len(), timestamp, "Collected host metrics");
        self.metric_map
            .put_metric(DEFAULT_HOST_APP_ID, &metrics, timestamp);

        if let Some(metering) = &self.metering {
            self.metric_map.put_metric(
                metering.app_id(),
                &metering.metering_metrics(&metrics),
                timestamp,
            );
            self.metric_map.put_metric(
                metering.instance_type_app_id(),
                &metering.instance_type_metrics(),
                timestamp,
            );
        }
        true
    }

    fn collect(&mut self, group: &MetricGroup) -> Option<MetricValues> {
        let s = &mut self.sampler;
        let metrics = match group {
            MetricGroup::Cpu => s.cpu_times(),
            MetricGroup::Disk => merged([
                s.combined_disk_usage(),
                s.combined_disk_io_counters(),
                s.disk_io_counters_per_disk(),
            ]),
            MetricGroup::Network => s.network_info(),
            MetricGroup::Mem => s.mem_info(),
            MetricGroup::Process => s.process_info(),
            MetricGroup::All => merged([
                s.cpu_times(),
                s.combined_disk_usage(),
                s.combined_disk_io_counters(),
                s.disk_io_counters_per_disk(),
                s.network_info(),
                s.mem_info(),
                s.process_info(),
            ]),
            MetricGroup::Unknown(_) => return None,
        };
        Some(metrics)
    }
}

fn merged<const N: usize>(parts: [MetricValues; N]) -> MetricValues {
    parts.into_iter().flatten().collect()
}
