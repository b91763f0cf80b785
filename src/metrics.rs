//! System metrics sampling for the heartbeat.

use serde::Serialize;
use sysinfo::{Disks, System};

use crate::status::DeviceStatus;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// One heartbeat payload — recomputed on every tick, never persisted.
///
/// Memory and disk figures are whole megabytes; `cpu_load` is a percentage.
/// This is the exact body of `POST /heartbeat`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub user_id: String,
    pub url: String,
    pub cpu_cores: usize,
    pub cpu_load: f32,
    pub ram_total: u64,
    pub ram_used: u64,
    pub disk_free: u64,
    pub status: DeviceStatus,
}

/// Stateful sampler held across ticks.
///
/// CPU usage is a delta measurement — the same `System` must be refreshed
/// on consecutive ticks for `cpu_load` to mean anything, so the poll loop
/// owns one sampler for its whole lifetime.
pub struct MetricsSampler {
    sys: System,
}

impl MetricsSampler {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }

    /// Take a fresh snapshot of the machine.
    pub fn sample(&mut self, user_id: &str, url: &str, status: DeviceStatus) -> MetricsSnapshot {
        self.sys.refresh_memory();
        self.sys.refresh_cpu_usage();

        let disks = Disks::new_with_refreshed_list();
        let disk_free = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .or_else(|| disks.list().first())
            .map(|d| d.available_space() / BYTES_PER_MB)
            .unwrap_or(0);

        MetricsSnapshot {
            user_id: user_id.to_string(),
            url: url.to_string(),
            cpu_cores: System::physical_core_count().unwrap_or(1),
            cpu_load: self.sys.global_cpu_usage(),
            ram_total: self.sys.total_memory() / BYTES_PER_MB,
            ram_used: self.sys.used_memory() / BYTES_PER_MB,
            disk_free,
            status,
        }
    }
}

impl Default for MetricsSampler {
    fn default() -> Self {
        Self::new()
    }
}
