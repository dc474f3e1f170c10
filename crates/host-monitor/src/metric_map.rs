//! Buffer of collected samples awaiting delivery, grouped per application.

use std::collections::BTreeMap;
use std::mem;
use std::sync::Mutex;

use api_types::MetricValue;
use api_types::MetricValues;
use api_types::TimelineMetric;
use api_types::TimelineMetrics;

/// Application id host level samples are filed under.
pub const DEFAULT_HOST_APP_ID: &str = "_HOST";

type Series = BTreeMap<u64, MetricValue>;

/// Samples taken out of an [`ApplicationMetricMap`].
///
/// Layout is app id -> metric name -> timestamp -> value, so per-metric
/// samples stay ordered by collection time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSnapshot {
    apps: BTreeMap<String, BTreeMap<String, Series>>,
}

impl MetricSnapshot {
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Number of buffered (metric, timestamp) points.
    pub fn point_count(&self) -> usize {
        self.apps
            .values()
            .flat_map(|metrics| metrics.values())
            .map(BTreeMap::len)
            .sum()
    }

    pub fn app_ids(&self) -> impl Iterator<Item = &str> {
        self.apps.keys().map(String::as_str)
    }

    /// Samples of one metric, oldest first.
    pub fn series(&self, app_id: &str, metric: &str) -> Option<&BTreeMap<u64, MetricValue>> {
        self.apps.get(app_id)?.get(metric)
    }

    fn insert(&mut self, app_id: &str, metrics: &MetricValues, timestamp: u64) {
        let app = self.apps.entry(app_id.to_string()).or_default();
        for (name, value) in metrics {
            app.entry(name.clone())
                .or_default()
                .insert(timestamp, value.clone());
        }
    }

    /// Folds `older` into `self`, keeping values already present in `self`
    /// for identical timestamps.
    fn merge_older(&mut self, older: MetricSnapshot) {
        for (app_id, metrics) in older.apps {
            let app = self.apps.entry(app_id).or_default();
            for (name, series) in metrics {
                let current = app.entry(name).or_default();
                for (timestamp, value) in series {
                    current.entry(timestamp).or_insert(value);
                }
            }
        }
    }

    /// Converts to the collector payload, one entry per (app, metric).
    pub fn to_timeline(&self, hostname: Option<&str>, instance_id: Option<&str>) -> TimelineMetrics {
        let metrics = self
            .apps
            .iter()
            .flat_map(|(app_id, metrics)| {
                metrics.iter().filter_map(move |(name, series)| {
                    let starttime = *series.keys().next()?;
                    Some(TimelineMetric {
                        hostname: hostname.map(str::to_string),
                        metricname: name.clone(),
                        appid: app_id.clone(),
                        instanceid: instance_id.map(str::to_string),
                        starttime,
                        metrics: series.clone(),
                    })
                })
            })
            .collect();
        TimelineMetrics { metrics }
    }
}

/// Thread-safe accumulator shared by the event consumer and the emitter.
///
/// `put_metric` and `drain` are serialized by one lock, so a drain observes
/// either all or none of a concurrent put.
#[derive(Debug)]
pub struct ApplicationMetricMap {
    hostname: String,
    instance_id: Option<String>,
    inner: Mutex<MetricSnapshot>,
}

impl ApplicationMetricMap {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            instance_id: None,
            inner: Mutex::new(MetricSnapshot::default()),
        }
    }

    /// Tags every flattened metric with `instance_id`.
    pub fn with_instance_id(mut self, instance_id: Option<String>) -> Self {
        self.instance_id = instance_id;
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Merges `metrics` sampled at `timestamp` into the buffer for `app_id`.
    ///
    /// Samples of earlier timestamps are never replaced.
    pub fn put_metric(&self, app_id: &str, metrics: &MetricValues, timestamp: u64) {
        if metrics.is_empty() {
            return;
        }
        self.inner
            .lock()
            .expect("poisoned")
            .insert(app_id, metrics, timestamp);
    }

    /// Atomically takes every buffered sample, leaving the map empty.
    pub fn drain(&self) -> MetricSnapshot {
        mem::take(&mut *self.inner.lock().expect("poisoned"))
    }

    /// Puts undelivered samples back.
    ///
    /// Samples buffered since the drain are kept as they are; the restored
    /// ones slot in by timestamp.
    pub fn restore(&self, snapshot: MetricSnapshot) {
        if snapshot.is_empty() {
            return;
        }
        self.inner.lock().expect("poisoned").merge_older(snapshot);
    }

    /// Payload for a drained snapshot, tagged with this host's identity.
    pub fn flatten(&self, snapshot: &MetricSnapshot) -> TimelineMetrics {
        snapshot.to_timeline(Some(&self.hostname), self.instance_id.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("poisoned").is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.inner.lock().expect("poisoned").point_count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use similar_asserts::assert_eq;

    use super::*;

    fn values(pairs: &[(&str, i64)]) -> MetricValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), MetricValue::Integer(*v)))
            .collect()
    }

    #[test]
    fn put_merges_samples_per_metric() {
        let map = ApplicationMetricMap::new("host1");
        map.put_metric("APP1", &values(&[("metric1", 1)]), 1);
        map.put_metric("APP1", &values(&[("metric1", 2), ("metric2", 5)]), 2);

        let snapshot = map.drain();
        let series = snapshot.series("APP1", "metric1").expect("metric1 buffered");
        assert_eq!(series.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(snapshot.point_count(), 3);
        assert!(map.is_empty(), "drain empties the map");
    }

    #[test]
    fn flatten_produces_one_entry_per_metric() {
        let map = ApplicationMetricMap::new("host1").with_instance_id(Some("i-1".to_string()));
        map.put_metric("APP1", &values(&[("metric1", 1)]), 1);
        map.put_metric(DEFAULT_HOST_APP_ID, &values(&[("cpu_num", 8)]), 7);

        let payload = map.flatten(&map.drain());

        assert_eq!(payload.metrics.len(), 2);
        let metric1 = payload
            .metrics
            .iter()
            .find(|m| m.metricname == "metric1")
            .expect("metric1 present");
        assert_eq!(metric1.appid, "APP1");
        assert_eq!(metric1.starttime, 1);
        assert_eq!(metric1.hostname.as_deref(), Some("host1"));
        assert_eq!(metric1.instanceid.as_deref(), Some("i-1"));
    }

    #[test]
    fn start_time_is_earliest_sample() {
        let map = ApplicationMetricMap::new("host1");
        map.put_metric("APP1", &values(&[("m", 1)]), 30);
        map.put_metric("APP1", &values(&[("m", 2)]), 10);

        let payload = map.flatten(&map.drain());
        assert_eq!(payload.metrics[0].starttime, 10);
        assert_eq!(payload.point_count(), 2);
    }

    #[test]
    fn restore_keeps_newer_samples_and_order() {
        let map = ApplicationMetricMap::new("host1");
        map.put_metric("APP1", &values(&[("m", 1)]), 1);
        let drained = map.drain();

        map.put_metric("APP1", &values(&[("m", 2)]), 2);
        map.restore(drained);

        let snapshot = map.drain();
        let series = snapshot.series("APP1", "m").expect("m buffered");
        assert_eq!(
            series.iter().map(|(t, v)| (*t, v.clone())).collect::<Vec<_>>(),
            vec![(1, MetricValue::Integer(1)), (2, MetricValue::Integer(2))]
        );
    }

    #[test]
    fn restore_does_not_overwrite_same_timestamp() {
        let map = ApplicationMetricMap::new("host1");
        map.put_metric("APP1", &values(&[("m", 1)]), 5);
        let drained = map.drain();
        map.put_metric("APP1", &values(&[("m", 9)]), 5);

        map.restore(drained);

        let snapshot = map.drain();
        assert_eq!(
            snapshot.series("APP1", "m").and_then(|s| s.get(&5)),
            Some(&MetricValue::Integer(9))
        );
    }

    #[test]
    fn empty_put_is_ignored() {
        let map = ApplicationMetricMap::new("host1");
        map.put_metric("APP1", &MetricValues::new(), 1);
        assert!(map.is_empty());
        assert!(map.drain().is_empty());
    }

    #[test]
    fn concurrent_puts_and_drains_lose_nothing() {
        let map = Arc::new(ApplicationMetricMap::new("host1"));
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let map = Arc::clone(&map);
                std::thread::spawn(move || {
                    for i in 0..250u64 {
                        map.put_metric("APP1", &values(&[("m", 1)]), w * 1_000 + i);
                    }
                })
            })
            .collect();

        let mut drained = 0;
        for _ in 0..50 {
            drained += map.drain().point_count();
        }
        for writer in writers {
            writer.join().expect("writer should not panic");
        }
        drained += map.drain().point_count();

        assert_eq!(drained, 1_000);
    }
}
