//! OS metric samplers.
//!
//! [`HostSampler`] is the seam the metrics collector reads through;
//! [`SysinfoHostInfo`] is the default implementation backed by `sysinfo`.

use std::collections::HashMap;
use std::path::Path;

use api_types::MetricValue;
use api_types::MetricValues;
use sysinfo::Disks;
use sysinfo::Networks;
use sysinfo::ProcessStatus;
use sysinfo::ProcessesToUpdate;
use sysinfo::System;

const KB: u64 = 1024;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Group scoped accessors over the host's current state.
///
/// Calls are synchronous and expected to return quickly.
pub trait HostSampler: Send {
    fn cpu_times(&mut self) -> MetricValues;
    fn combined_disk_usage(&mut self) -> MetricValues;
    fn combined_disk_io_counters(&mut self) -> MetricValues;
    fn disk_io_counters_per_disk(&mut self) -> MetricValues;
    fn network_info(&mut self) -> MetricValues;
    fn mem_info(&mut self) -> MetricValues;
    fn process_info(&mut self) -> MetricValues;
}

#[derive(Debug, Default, Clone, Copy)]
struct NetCounters {
    bytes_in: u64,
    bytes_out: u64,
    pkts_in: u64,
    pkts_out: u64,
}

/// `sysinfo` backed sampler.
pub struct SysinfoHostInfo {
    system: System,
    disks: Disks,
    networks: Networks,
    last_net: HashMap<String, NetCounters>,
}

impl Default for SysinfoHostInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoHostInfo {
    pub fn new() -> Self {
        let mut system = System::new();
        // cpu usage is computed between two refreshes
        system.refresh_cpu_all();
        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            last_net: HashMap::new(),
        }
    }

    /// Host name reported by the OS.
    pub fn host_name() -> Option<String> {
        System::host_name()
    }
}

fn device_name(name: &std::ffi::OsStr) -> String {
    let name = name.to_string_lossy();
    Path::new(name.as_ref())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.into_owned())
}

impl HostSampler for SysinfoHostInfo {
    fn cpu_times(&mut self) -> MetricValues {
        self.system.refresh_cpu_all();
        let busy = f64::from(self.system.global_cpu_usage());
        let load = System::load_average();

        MetricValues::from([
            ("cpu_num".to_string(), MetricValue::from(self.system.cpus().len())),
            ("cpu_busy".to_string(), MetricValue::from(busy)),
            ("cpu_idle".to_string(), MetricValue::from((100.0 - busy).max(0.0))),
            ("load_one".to_string(), MetricValue::from(load.one)),
            ("load_five".to_string(), MetricValue::from(load.five)),
            ("load_fifteen".to_string(), MetricValue::from(load.fifteen)),
        ])
    }

    fn combined_disk_usage(&mut self) -> MetricValues {
        self.disks.refresh(true);
        let (total, free) = self.disks.iter().fold((0u64, 0u64), |(t, f), disk| {
            (t + disk.total_space(), f + disk.available_space())
        });
        let used = total.saturating_sub(free);
        let percent = if total > 0 {
            used as f64 * 100.0 / total as f64
        } else {
            0.0
        };

        MetricValues::from([
            ("disk_total".to_string(), MetricValue::from(total as f64 / GB)),
            ("disk_used".to_string(), MetricValue::from(used as f64 / GB)),
            ("disk_free".to_string(), MetricValue::from(free as f64 / GB)),
            ("disk_percent".to_string(), MetricValue::from(percent)),
        ])
    }

    fn combined_disk_io_counters(&mut self) -> MetricValues {
        self.disks.refresh(true);
        let (read, written) = self.disks.iter().fold((0u64, 0u64), |(r, w), disk| {
            let usage = disk.usage();
            (r + usage.total_read_bytes, w + usage.total_written_bytes)
        });

        MetricValues::from([
            ("read_bytes".to_string(), MetricValue::from(read)),
            ("write_bytes".to_string(), MetricValue::from(written)),
        ])
    }

    fn disk_io_counters_per_disk(&mut self) -> MetricValues {
        self.disks.refresh(true);
        let mut metrics = MetricValues::new();
        for disk in self.disks.iter() {
            let device = device_name(disk.name());
            let usage = disk.usage();
            metrics.insert(
                format!("sdisk_{device}_read_bytes"),
                MetricValue::from(usage.total_read_bytes),
            );
            metrics.insert(
                format!("sdisk_{device}_write_bytes"),
                MetricValue::from(usage.total_written_bytes),
            );
        }
        metrics
    }

    fn network_info(&mut self) -> MetricValues {
        self.networks.refresh(true);
        let mut delta = NetCounters::default();
        for (name, data) in self.networks.iter() {
            let now = NetCounters {
                bytes_in: data.total_received(),
                bytes_out: data.total_transmitted(),
                pkts_in: data.total_packets_received(),
                pkts_out: data.total_packets_transmitted(),
            };
            // first sighting of an interface reports zero traffic
            let prev = self.last_net.insert(name.clone(), now).unwrap_or(now);
            delta.bytes_in += now.bytes_in.saturating_sub(prev.bytes_in);
            delta.bytes_out += now.bytes_out.saturating_sub(prev.bytes_out);
            delta.pkts_in += now.pkts_in.saturating_sub(prev.pkts_in);
            delta.pkts_out += now.pkts_out.saturating_sub(prev.pkts_out);
        }

        MetricValues::from([
            ("bytes_in".to_string(), MetricValue::from(delta.bytes_in)),
            ("bytes_out".to_string(), MetricValue::from(delta.bytes_out)),
            ("pkts_in".to_string(), MetricValue::from(delta.pkts_in)),
            ("pkts_out".to_string(), MetricValue::from(delta.pkts_out)),
        ])
    }

    fn mem_info(&mut self) -> MetricValues {
        self.system.refresh_memory();
        let s = &self.system;

        MetricValues::from([
            ("mem_total".to_string(), MetricValue::from(s.total_memory() / KB)),
            ("mem_free".to_string(), MetricValue::from(s.free_memory() / KB)),
            ("mem_used".to_string(), MetricValue::from(s.used_memory() / KB)),
            ("mem_available".to_string(), MetricValue::from(s.available_memory() / KB)),
            ("swap_total".to_string(), MetricValue::from(s.total_swap() / KB)),
            ("swap_free".to_string(), MetricValue::from(s.free_swap() / KB)),
        ])
    }

    fn process_info(&mut self) -> MetricValues {
        self.system.refresh_processes(ProcessesToUpdate::All, true);
        let processes = self.system.processes();
        let running = processes
            .values()
            .filter(|p| p.status() == ProcessStatus::Run)
            .count();

        MetricValues::from([
            ("proc_total".to_string(), MetricValue::from(processes.len())),
            ("proc_run".to_string(), MetricValue::from(running)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_name_strips_dev_prefix() {
        assert_eq!(device_name(std::ffi::OsStr::new("/dev/sda1")), "sda1");
        assert_eq!(device_name(std::ffi::OsStr::new("nvme0n1")), "nvme0n1");
    }

    #[test]
    fn sysinfo_reports_cpu_and_processes() {
        let mut info = SysinfoHostInfo::new();

        let cpu = info.cpu_times();
        assert!(matches!(cpu.get("cpu_num"), Some(MetricValue::Integer(n)) if *n > 0));

        let procs = info.process_info();
        assert!(matches!(procs.get("proc_total"), Some(MetricValue::Integer(n)) if *n > 0));
    }

    #[test]
    fn first_network_sample_reports_zero_delta() {
        let mut info = SysinfoHostInfo::new();
        let net = info.network_info();
        assert_eq!(net.get("bytes_in"), Some(&MetricValue::Integer(0)));
    }
}
