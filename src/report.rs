use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const BYTES_PER_GB: f64 = 1e9;

/// Outcome of one independently degradable part of the report.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability<T> {
    Available(T),
    Unavailable(String),
}

impl<T> Availability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemIdentity {
    pub system: String,
    pub node_name: String,
    pub release: String,
    pub version: String,
    pub machine: String,
    pub processor: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuSnapshot {
    pub physical_cores: Option<usize>,
    pub logical_cores: usize,
    pub min_frequency_mhz: f64,
    pub max_frequency_mhz: f64,
    pub current_frequency_mhz: f64,
    pub per_core_usage_percent: Vec<f32>,
    pub total_usage_percent: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySnapshot {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
}

impl MemorySnapshot {
    pub fn usage_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let busy = self.total_bytes.saturating_sub(self.available_bytes);
        ((busy as f64 / self.total_bytes as f64) * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiskSnapshot {
    pub device: String,
    pub mountpoint: String,
    pub fs_type: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TempReading {
    pub label: String,
    pub current_celsius: f64,
}

/// Sensor chip name to its readings.
pub type ThermalSnapshot = BTreeMap<String, Vec<TempReading>>;

#[derive(Debug, Clone, PartialEq)]
pub struct GpuSnapshot {
    pub name: String,
    pub load_percent: f64,
    pub memory_free_mb: f64,
    pub memory_used_mb: f64,
    pub memory_total_mb: f64,
    pub temperature_celsius: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemInfoReport {
    pub identity: SystemIdentity,
    pub cpu: CpuSnapshot,
    pub memory: MemorySnapshot,
    pub disks: Vec<DiskSnapshot>,
    pub thermal: Availability<ThermalSnapshot>,
    pub gpu: Availability<Vec<GpuSnapshot>>,
    pub boot_time: String,
}

impl SystemInfoReport {
    /// Renders the human-facing nested record printed by the binary.
    pub fn to_record(&self) -> Value {
        let id = &self.identity;
        let cpu = &self.cpu;
        let mem = &self.memory;

        let disks: Vec<Value> = self
            .disks
            .iter()
            .map(|d| {
                json!({
                    "Device": d.device,
                    "Mountpoint": d.mountpoint,
                    "File System Type": d.fs_type,
                    "Total Size": gigabytes(d.total_bytes),
                    "Used": gigabytes(d.used_bytes),
                    "Free": gigabytes(d.free_bytes),
                    "Percentage": percent(d.usage_percent),
                })
            })
            .collect();

        let thermal = match &self.thermal {
            Availability::Available(chips) => {
                let mut out = Map::new();
                for (chip, readings) in chips {
                    let entries: Vec<Value> = readings
                        .iter()
                        .map(|t| {
                            json!({
                                "Label": t.label,
                                "Current": format!("{:.1}°C", t.current_celsius),
                            })
                        })
                        .collect();
                    out.insert(chip.clone(), Value::Array(entries));
                }
                Value::Object(out)
            }
            Availability::Unavailable(reason) => Value::String(reason.clone()),
        };

        let gpu = match &self.gpu {
            Availability::Available(gpus) => Value::Array(
                gpus.iter()
                    .map(|g| {
                        json!({
                            "GPU Name": g.name,
                            "Load": format!("{:.0}%", g.load_percent),
                            "Free Memory": format!("{} MB", g.memory_free_mb),
                            "Used Memory": format!("{} MB", g.memory_used_mb),
                            "Total Memory": format!("{} MB", g.memory_total_mb),
                            "Temperature": format!("{}°C", g.temperature_celsius),
                        })
                    })
                    .collect(),
            ),
            Availability::Unavailable(reason) => Value::String(reason.clone()),
        };

        json!({
            "System Info": {
                "System": id.system,
                "Node Name": id.node_name,
                "Release": id.release,
                "Version": id.version,
                "Machine": id.machine,
                "Processor": id.processor,
            },
            "CPU Info": {
                "Physical Cores": cpu.physical_cores,
                "Total Cores": cpu.logical_cores,
                "Max Frequency": megahertz(cpu.max_frequency_mhz),
                "Min Frequency": megahertz(cpu.min_frequency_mhz),
                "Current Frequency": megahertz(cpu.current_frequency_mhz),
                "CPU Usage Per Core": cpu
                    .per_core_usage_percent
                    .iter()
                    .map(|u| percent(f64::from(*u)))
                    .collect::<Vec<_>>(),
                "Total CPU Usage": percent(f64::from(cpu.total_usage_percent)),
            },
            "RAM Info": {
                "Total": gigabytes(mem.total_bytes),
                "Available": gigabytes(mem.available_bytes),
                "Used": gigabytes(mem.used_bytes),
                "Percentage": percent(mem.usage_percent()),
            },
            "Disk Info": disks,
            "Temperature Info": thermal,
            "GPU Info": gpu,
            "Boot Time": self.boot_time,
        })
    }
}

fn gigabytes(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / BYTES_PER_GB)
}

fn megahertz(mhz: f64) -> String {
    format!("{mhz:.2} MHz")
}

fn percent(value: f64) -> String {
    format!("{value:.1}%")
}
