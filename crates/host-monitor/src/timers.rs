//! Periodic producers of collection events.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::event::CollectionEvent;
use crate::event::MetricGroup;
use crate::stop::StopSignal;

/// Default collection interval for the `all` group.
pub const DEFAULT_COLLECTION_INTERVAL: Duration = Duration::from_secs(10);

/// Collect `group` every `interval`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTimer {
    pub group: MetricGroup,
    pub interval: Duration,
}

impl GroupTimer {
    pub fn new(group: MetricGroup, interval: Duration) -> Self {
        Self { group, interval }
    }
}

impl Default for GroupTimer {
    fn default() -> Self {
        Self::new(MetricGroup::All, DEFAULT_COLLECTION_INTERVAL)
    }
}

/// Enqueues a host level event for the timer's group once per interval.
///
/// Ends when the stop signal is set or the queue's consumer is gone. A full
/// queue delays the timer rather than dropping the event.
pub async fn run_timer(timer: GroupTimer, events: mpsc::Sender<CollectionEvent>, stop: StopSignal) {
    tracing::info!(group = %timer.group, interval = ?timer.interval, "Collection timer started");
    loop {
        if stop.wait(timer.interval).await.is_stopped() {
            break;
        }
        let event = CollectionEvent::host(timer.group.clone());
        let sent = tokio::select! {
            _ = stop.stopped() => break,
            sent = events.send(event) => sent,
        };
        if sent.is_err() {
            tracing::info!(group = %timer.group, "Collection queue closed");
            break;
        }
    }
    tracing::info!(group = %timer.group, "Collection timer stopped");
}
