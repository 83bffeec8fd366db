use crate::report::{TempReading, ThermalSnapshot};
use std::fs;
use std::path::Path;
use sysinfo::{ComponentExt, System, SystemExt};
use tracing::debug;

pub const HWMON_ROOT: &str = "/sys/class/hwmon";
pub const THERMAL_ROOT: &str = "/sys/class/thermal";

/// Whether the running platform exposes temperature sensors at all. macOS
/// and Windows have no sensor interface the collector reads.
pub const fn platform_supported() -> bool {
    cfg!(any(target_os = "linux", target_os = "freebsd"))
}

pub fn collect_temperatures(system: &mut System) -> ThermalSnapshot {
    #[cfg(target_os = "linux")]
    {
        let hwmon = read_hwmon(Path::new(HWMON_ROOT));
        if !hwmon.is_empty() {
            return hwmon;
        }
        let zones = read_thermal_zones(Path::new(THERMAL_ROOT));
        if !zones.is_empty() {
            debug!(zones = zones.len(), "датчики hwmon не найдены, используются thermal zones");
            return zones;
        }
    }

    system.refresh_components_list();
    system.refresh_components();
    group_component_labels(
        system
            .components()
            .iter()
            .map(|c| (c.label().to_string(), c.temperature() as f64)),
    )
}

/// Reads `tempN_input` files below every hwmon device, keyed by the device's
/// `name` file.
pub fn read_hwmon(root: &Path) -> ThermalSnapshot {
    let mut out = ThermalSnapshot::new();
    let Ok(entries) = fs::read_dir(root) else {
        return out;
    };

    for entry in entries.flatten() {
        let dir = entry.path();
        let chip = read_trimmed(&dir.join("name")).unwrap_or_else(|| {
            dir.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        });

        let mut inputs: Vec<(u32, TempReading)> = Vec::new();
        for sub in [dir.clone(), dir.join("device")] {
            let Ok(files) = fs::read_dir(&sub) else {
                continue;
            };
            for file in files.flatten() {
                let fname = file.file_name().to_string_lossy().to_string();
                let Some(index) = temp_input_index(&fname) else {
                    continue;
                };
                if inputs.iter().any(|(i, _)| *i == index) {
                    continue;
                }
                let Some(milli) = read_trimmed(&file.path()).and_then(|s| s.parse::<f64>().ok())
                else {
                    continue;
                };
                let label = read_trimmed(&sub.join(format!("temp{index}_label"))).unwrap_or_default();
                inputs.push((
                    index,
                    TempReading {
                        label,
                        current_celsius: milli / 1000.0,
                    },
                ));
            }
        }

        if inputs.is_empty() {
            continue;
        }
        inputs.sort_by_key(|(i, _)| *i);
        out.entry(chip)
            .or_default()
            .extend(inputs.into_iter().map(|(_, r)| r));
    }

    out
}

/// Reads `thermal_zone*/temp`, keyed by the zone's `type` file.
pub fn read_thermal_zones(root: &Path) -> ThermalSnapshot {
    let mut out = ThermalSnapshot::new();
    let Ok(entries) = fs::read_dir(root) else {
        return out;
    };

    let mut zones: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("thermal_zone"))
        })
        .collect();
    zones.sort();

    for path in zones {
        let Some(raw) = read_trimmed(&path.join("temp")).and_then(|s| s.parse::<f64>().ok()) else {
            continue;
        };
        let kind = read_trimmed(&path.join("type")).unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        });
        let celsius = if raw > 1000.0 { raw / 1000.0 } else { raw };
        out.entry(kind).or_default().push(TempReading {
            label: String::new(),
            current_celsius: celsius,
        });
    }

    out
}

/// Splits `"chip label"` style component names into chip groups.
pub fn group_component_labels(
    components: impl IntoIterator<Item = (String, f64)>,
) -> ThermalSnapshot {
    let mut out = ThermalSnapshot::new();
    for (name, celsius) in components {
        let (chip, label) = match name.trim().split_once(' ') {
            Some((chip, label)) => (chip.to_string(), label.trim().to_string()),
            None => (name.trim().to_string(), String::new()),
        };
        out.entry(chip).or_default().push(TempReading {
            label,
            current_celsius: celsius,
        });
    }
    out
}

fn temp_input_index(fname: &str) -> Option<u32> {
    fname
        .strip_prefix("temp")?
        .strip_suffix("_input")?
        .parse()
        .ok()
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
