//! Host monitoring agent.
//!
//! Timers enqueue [`event::CollectionEvent`]s, the [`collector::MetricsCollector`]
//! samples the host and buffers results in an [`metric_map::ApplicationMetricMap`],
//! and the [`emitter::Emitter`] periodically ships the buffer to one of the
//! configured collector hosts, failing over between them through a
//! [`blacklist::BlacklistedSet`]. Every loop stops on a shared
//! [`stop::StopSignal`].

pub mod app;
pub mod blacklist;
pub mod collector;
pub mod config;
pub mod emitter;
pub mod error;
pub mod event;
pub mod host_info;
pub mod instance_type;
pub mod metering;
pub mod metric_map;
pub mod signals;
pub mod stop;
pub mod timers;

/// Current wall clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
