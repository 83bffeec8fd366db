pub mod disk;
pub mod gpu;
pub mod system;
pub mod thermal;

use crate::config::Config;
use crate::report::{
    Availability, CpuSnapshot, GpuSnapshot, MemorySnapshot, SystemIdentity, SystemInfoReport,
    ThermalSnapshot,
};
use chrono::{DateTime, Local, Utc};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const THERMAL_UNSUPPORTED_MESSAGE: &str =
    "Temperature sensors are not supported on this system.";
pub const GPU_UNAVAILABLE_MESSAGE: &str =
    "GPU Info not available: nvidia-smi was not found. Install the NVIDIA driver utilities to get GPU information.";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("permission denied for {path}")]
    PermissionDenied { path: String },
    #[error("i/o error for {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{program} failed: {reason}")]
    Command { program: String, reason: String },
}

/// A mounted filesystem as enumerated by the host, before its usage is queried.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub device: String,
    pub mountpoint: String,
    pub fs_type: String,
    /// Space figures reported alongside the enumeration, used when the
    /// direct usage query is unavailable or fails.
    pub listed_total_bytes: u64,
    pub listed_available_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub percent: f64,
}

/// Host metrics provider.
pub trait HostProbe {
    fn identity(&mut self) -> SystemIdentity;
    /// Blocks for `sample_interval` while utilization is measured.
    fn cpu(&mut self, sample_interval: Duration) -> CpuSnapshot;
    fn memory(&mut self) -> MemorySnapshot;
    fn partitions(&mut self) -> Vec<Partition>;
    fn partition_usage(&self, partition: &Partition) -> Result<PartitionUsage, ProbeError>;
    fn supports_temperatures(&self) -> bool;
    fn temperatures(&mut self) -> ThermalSnapshot;
    /// Seconds since the Unix epoch.
    fn boot_time(&self) -> u64;
}

pub trait GpuProbe {
    fn query(&self) -> Result<Vec<GpuSnapshot>, ProbeError>;
}

/// Optional features detected once before collection starts.
pub struct Capabilities {
    pub thermal: bool,
    pub gpu: Option<Box<dyn GpuProbe>>,
}

impl Capabilities {
    pub fn detect(cfg: &Config, probe: &dyn HostProbe) -> Self {
        let thermal = cfg.thermal.enabled && probe.supports_temperatures();
        let gpu = if cfg.gpu.enabled {
            gpu::NvidiaSmi::detect(&cfg.gpu.nvidia_smi_path)
                .map(|smi| Box::new(smi) as Box<dyn GpuProbe>)
        } else {
            None
        };
        debug!(thermal, gpu = gpu.is_some(), "определены возможности системы");
        Self { thermal, gpu }
    }
}

pub struct SystemInfoCollector<P: HostProbe> {
    probe: P,
    capabilities: Capabilities,
    sample_interval: Duration,
}

impl<P: HostProbe> SystemInfoCollector<P> {
    pub fn new(probe: P, capabilities: Capabilities, sample_interval: Duration) -> Self {
        Self {
            probe,
            capabilities,
            sample_interval,
        }
    }

    pub fn collect(&mut self) -> SystemInfoReport {
        let identity = self.probe.identity();
        let cpu = self.probe.cpu(self.sample_interval);
        let memory = self.probe.memory();
        let disks = disk::collect_disks(&mut self.probe);

        let thermal = if self.capabilities.thermal {
            Availability::Available(self.probe.temperatures())
        } else {
            Availability::Unavailable(THERMAL_UNSUPPORTED_MESSAGE.to_string())
        };

        let gpu = match &self.capabilities.gpu {
            Some(probe) => match probe.query() {
                Ok(gpus) => Availability::Available(gpus),
                Err(err) => {
                    debug!(error = %err, "не удалось опросить GPU");
                    Availability::Unavailable(format!("GPU Info not available: {err}"))
                }
            },
            None => Availability::Unavailable(GPU_UNAVAILABLE_MESSAGE.to_string()),
        };

        let boot_time = format_boot_time(self.probe.boot_time());

        SystemInfoReport {
            identity,
            cpu,
            memory,
            disks,
            thermal,
            gpu,
            boot_time,
        }
    }
}

pub fn format_boot_time(unix_secs: u64) -> String {
    let utc = i64::try_from(unix_secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_default();
    utc.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
