use crate::collectors::{disk, thermal, HostProbe, Partition, PartitionUsage, ProbeError};
use crate::report::{CpuSnapshot, MemorySnapshot, SystemIdentity, ThermalSnapshot};
#[cfg(target_os = "linux")]
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use sysinfo::{CpuExt, CpuRefreshKind, DiskExt, System, SystemExt};
use tracing::debug;

pub const CPUFREQ_ROOT: &str = "/sys/devices/system/cpu/cpu0/cpufreq";
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";
pub const MEMINFO_PATH: &str = "/proc/meminfo";

/// [`HostProbe`] backed by `sysinfo`, with sysfs and statvfs where `sysinfo`
/// has no equivalent.
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn identity(&mut self) -> SystemIdentity {
        if self.system.cpus().is_empty() {
            self.system.refresh_cpu();
        }
        SystemIdentity {
            system: os_family(std::env::consts::OS).to_string(),
            node_name: self.system.host_name().unwrap_or_default(),
            release: self.system.kernel_version().unwrap_or_default(),
            version: self.system.long_os_version().unwrap_or_default(),
            machine: std::env::consts::ARCH.to_string(),
            processor: self
                .system
                .cpus()
                .first()
                .map(|c| c.brand().trim().to_string())
                .unwrap_or_default(),
        }
    }

    fn cpu(&mut self, sample_interval: Duration) -> CpuSnapshot {
        self.system.refresh_cpu();
        thread::sleep(sample_interval.max(System::MINIMUM_CPU_UPDATE_INTERVAL));
        // Plain refresh_cpu() only updates usage; frequency needs its own kind.
        self.system.refresh_cpu_specifics(CpuRefreshKind::everything());

        let cpus = self.system.cpus();
        let per_core_usage_percent: Vec<f32> = cpus.iter().map(|c| c.cpu_usage()).collect();
        let frequencies: Vec<f64> = cpus.iter().map(|c| c.frequency() as f64).collect();
        let current_frequency_mhz = current_frequency(&frequencies);
        let (min_frequency_mhz, max_frequency_mhz) = frequency_bounds().unwrap_or_else(|| {
            let max = frequencies.iter().copied().fold(0.0, f64::max);
            (0.0, max.max(current_frequency_mhz))
        });

        CpuSnapshot {
            physical_cores: self.system.physical_core_count(),
            logical_cores: per_core_usage_percent.len(),
            min_frequency_mhz,
            max_frequency_mhz,
            current_frequency_mhz,
            total_usage_percent: self.system.global_cpu_info().cpu_usage(),
            per_core_usage_percent,
        }
    }

    fn memory(&mut self) -> MemorySnapshot {
        self.system.refresh_memory();
        let total_bytes = self.system.total_memory();
        let available_bytes = self.system.available_memory();
        let used_bytes = read_meminfo_used(Path::new(MEMINFO_PATH))
            .unwrap_or_else(|| self.system.used_memory());
        MemorySnapshot {
            total_bytes,
            available_bytes,
            used_bytes,
        }
    }

    fn partitions(&mut self) -> Vec<Partition> {
        self.system.refresh_disks_list();
        self.system
            .disks()
            .iter()
            .map(|d| Partition {
                device: d.name().to_string_lossy().to_string(),
                mountpoint: d.mount_point().to_string_lossy().to_string(),
                fs_type: String::from_utf8_lossy(d.file_system()).to_string(),
                listed_total_bytes: d.total_space(),
                listed_available_bytes: d.available_space(),
            })
            .collect()
    }

    fn partition_usage(&self, partition: &Partition) -> Result<PartitionUsage, ProbeError> {
        disk::partition_usage(partition)
    }

    fn supports_temperatures(&self) -> bool {
        thermal::platform_supported()
    }

    fn temperatures(&mut self) -> ThermalSnapshot {
        thermal::collect_temperatures(&mut self.system)
    }

    fn boot_time(&self) -> u64 {
        self.system.boot_time()
    }
}

/// `uname`-style system name.
fn os_family(os: &str) -> &str {
    match os {
        "linux" => "Linux",
        "macos" => "Darwin",
        "windows" => "Windows",
        "freebsd" => "FreeBSD",
        "netbsd" => "NetBSD",
        "openbsd" => "OpenBSD",
        other => other,
    }
}

/// Mean of the per-CPU frequencies, or the `/proc/cpuinfo` figure when the
/// library reports none.
fn current_frequency(frequencies: &[f64]) -> f64 {
    let known: Vec<f64> = frequencies.iter().copied().filter(|f| *f > 0.0).collect();
    if !known.is_empty() {
        return known.iter().sum::<f64>() / known.len() as f64;
    }
    let fallback = read_cpuinfo_mhz(Path::new(CPUINFO_PATH));
    if fallback.is_none() {
        debug!("текущая частота процессора недоступна");
    }
    fallback.unwrap_or(0.0)
}

fn frequency_bounds() -> Option<(f64, f64)> {
    let bounds = read_cpufreq_bounds(Path::new(CPUFREQ_ROOT));
    if bounds.is_none() {
        debug!("границы частоты процессора недоступны, используется текущая частота");
    }
    bounds
}

/// Averages the `cpu MHz` lines of a `/proc/cpuinfo`-style file.
#[cfg(target_os = "linux")]
pub fn read_cpuinfo_mhz(path: &Path) -> Option<f64> {
    let text = fs::read_to_string(path).ok()?;
    let values: Vec<f64> = text
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            if key.trim() != "cpu MHz" {
                return None;
            }
            value.trim().parse::<f64>().ok()
        })
        .filter(|mhz| *mhz > 0.0)
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(not(target_os = "linux"))]
pub fn read_cpuinfo_mhz(_path: &Path) -> Option<f64> {
    None
}

/// Used memory the way `free(1)` counts it: total minus free, buffers,
/// page cache and reclaimable slab. Falls back to total minus free when
/// that would go negative (containers with odd accounting).
#[cfg(target_os = "linux")]
pub fn read_meminfo_used(path: &Path) -> Option<u64> {
    let text = fs::read_to_string(path).ok()?;
    let field = |name: &str| -> Option<u64> {
        text.lines().find_map(|line| {
            let (key, rest) = line.split_once(':')?;
            if key != name {
                return None;
            }
            let kb = rest.split_whitespace().next()?.parse::<u64>().ok()?;
            Some(kb.saturating_mul(1024))
        })
    };
    let total = field("MemTotal")?;
    let free = field("MemFree")?;
    let buffers = field("Buffers").unwrap_or(0);
    let cached = field("Cached").unwrap_or(0);
    let reclaimable = field("SReclaimable").unwrap_or(0);
    let used = total
        .checked_sub(free)
        .and_then(|v| v.checked_sub(buffers))
        .and_then(|v| v.checked_sub(cached))
        .and_then(|v| v.checked_sub(reclaimable))
        .unwrap_or_else(|| total.saturating_sub(free));
    Some(used)
}

#[cfg(not(target_os = "linux"))]
pub fn read_meminfo_used(_path: &Path) -> Option<u64> {
    None
}

/// Reads `cpuinfo_min_freq`/`cpuinfo_max_freq` (kHz) and returns MHz.
#[cfg(target_os = "linux")]
pub fn read_cpufreq_bounds(root: &Path) -> Option<(f64, f64)> {
    let read_khz = |name: &str| {
        fs::read_to_string(root.join(name))
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
    };
    let min = read_khz("cpuinfo_min_freq")?;
    let max = read_khz("cpuinfo_max_freq")?;
    Some((min / 1000.0, max / 1000.0))
}

#[cfg(not(target_os = "linux"))]
pub fn read_cpufreq_bounds(_root: &Path) -> Option<(f64, f64)> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_family_uses_uname_spelling() {
        assert_eq!(os_family("linux"), "Linux");
        assert_eq!(os_family("macos"), "Darwin");
        assert_eq!(os_family("haiku"), "haiku");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn cpufreq_bounds_convert_khz_to_mhz() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("cpuinfo_min_freq"), "800000\n").unwrap();
        fs::write(dir.path().join("cpuinfo_max_freq"), "4200000\n").unwrap();
        assert_eq!(read_cpufreq_bounds(dir.path()), Some((800.0, 4200.0)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn cpufreq_bounds_need_both_files() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("cpuinfo_max_freq"), "4200000\n").unwrap();
        assert_eq!(read_cpufreq_bounds(dir.path()), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn cpuinfo_mhz_is_averaged_over_processors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cpuinfo");
        fs::write(
            &path,
            "processor\t: 0\ncpu MHz\t\t: 2000.000\nflags\t\t: fpu\n\n\
             processor\t: 1\ncpu MHz\t\t: 3000.500\n",
        )
        .unwrap();
        let mhz = read_cpuinfo_mhz(&path).expect("cpu MHz lines");
        assert!((mhz - 2500.25).abs() < 1e-9);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn cpuinfo_without_mhz_lines_gives_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cpuinfo");
        fs::write(&path, "processor\t: 0\nCPU implementer\t: 0x41\n").unwrap();
        assert_eq!(read_cpuinfo_mhz(&path), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn meminfo_used_excludes_buffers_and_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("meminfo");
        fs::write(
            &path,
            "MemTotal:        1000 kB\nMemFree:          200 kB\nMemAvailable:     600 kB\n\
             Buffers:           50 kB\nCached:           150 kB\nSwapCached:         7 kB\n\
             SReclaimable:      100 kB\n",
        )
        .unwrap();
        assert_eq!(read_meminfo_used(&path), Some(500 * 1024));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn meminfo_used_falls_back_when_cache_exceeds_total() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("meminfo");
        fs::write(
            &path,
            "MemTotal: 1000 kB\nMemFree: 100 kB\nBuffers: 0 kB\nCached: 2000 kB\n",
        )
        .unwrap();
        assert_eq!(read_meminfo_used(&path), Some(900 * 1024));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn live_current_frequency_is_reported_when_the_kernel_exposes_it() {
        let kernel_reports = read_cpuinfo_mhz(Path::new(CPUINFO_PATH)).is_some()
            || Path::new(CPUFREQ_ROOT).join("scaling_cur_freq").exists();
        let mut probe = SysinfoProbe::new();
        let cpu = probe.cpu(Duration::from_millis(100));
        if kernel_reports {
            assert!(cpu.current_frequency_mhz > 0.0, "{cpu:?}");
            assert!(cpu.max_frequency_mhz >= cpu.min_frequency_mhz);
        }
    }

    #[test]
    fn current_frequency_ignores_unreported_cores() {
        assert_eq!(current_frequency(&[2000.0, 0.0, 3000.0]), 2500.0);
    }

    #[test]
    fn live_cpu_sample_has_one_entry_per_logical_core() {
        let mut probe = SysinfoProbe::new();
        let cpu = probe.cpu(Duration::from_millis(100));
        assert_eq!(cpu.per_core_usage_percent.len(), cpu.logical_cores);
        assert!(cpu.logical_cores >= 1);
        if let Some(physical) = cpu.physical_cores {
            assert!(physical <= cpu.logical_cores);
        }
    }

    #[test]
    fn live_memory_percentage_is_bounded() {
        let mut probe = SysinfoProbe::new();
        let mem = probe.memory();
        assert!(mem.total_bytes > 0);
        assert!((0.0..=100.0).contains(&mem.usage_percent()));
        assert!(mem.used_bytes <= mem.total_bytes);
    }

    #[test]
    fn live_identity_reports_machine_and_system() {
        let mut probe = SysinfoProbe::new();
        let id = probe.identity();
        assert_eq!(id.machine, std::env::consts::ARCH);
        assert!(!id.system.is_empty());
    }
}
