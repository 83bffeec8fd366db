use crate::collectors::{GpuProbe, ProbeError};
use crate::report::GpuSnapshot;
use std::process::{Command, Output};
use tracing::debug;

const QUERY_FIELDS: &str =
    "--query-gpu=utilization.gpu,memory.free,memory.used,memory.total,temperature.gpu,name";

/// NVIDIA GPUs queried through the `nvidia-smi` binary.
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    program: String,
}

impl NvidiaSmi {
    /// Returns a probe only when the binary can be spawned and lists devices.
    pub fn detect(program: &str) -> Option<Self> {
        match Command::new(program).arg("-L").output() {
            Ok(output) if output.status.success() => Some(Self {
                program: program.to_string(),
            }),
            Ok(output) => {
                debug!(program, status = %output.status, "nvidia-smi найден, но не отвечает");
                None
            }
            Err(err) => {
                debug!(program, error = %err, "nvidia-smi не найден");
                None
            }
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output, ProbeError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|err| ProbeError::Command {
                program: self.program.clone(),
                reason: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(ProbeError::Command {
                program: self.program.clone(),
                reason: output.status.to_string(),
            });
        }
        Ok(output)
    }
}

impl GpuProbe for NvidiaSmi {
    fn query(&self) -> Result<Vec<GpuSnapshot>, ProbeError> {
        let output = self.run(&[QUERY_FIELDS, "--format=csv,noheader,nounits"])?;
        Ok(parse_query_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses `--format=csv,noheader,nounits` lines in [`QUERY_FIELDS`] order.
pub fn parse_query_output(text: &str) -> Vec<GpuSnapshot> {
    text.lines()
        .filter_map(|line| {
            // Names may contain commas; they are queried last and kept verbatim.
            let parts: Vec<&str> = line.splitn(6, ',').collect();
            if parts.len() < 6 {
                return None;
            }
            let name = parts[5].trim().to_string();
            if name.is_empty() {
                return None;
            }

            Some(GpuSnapshot {
                name,
                load_percent: parse_f64_loose(parts[0]).unwrap_or(0.0),
                memory_free_mb: parse_f64_loose(parts[1]).unwrap_or(0.0),
                memory_used_mb: parse_f64_loose(parts[2]).unwrap_or(0.0),
                memory_total_mb: parse_f64_loose(parts[3]).unwrap_or(0.0),
                temperature_celsius: parse_f64_loose(parts[4]).unwrap_or(0.0),
            })
        })
        .collect()
}

fn parse_f64_loose(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }

    if let Ok(v) = trimmed.replace(',', ".").parse::<f64>() {
        return Some(v);
    }

    let filtered: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        .collect();
    if filtered.is_empty() {
        return None;
    }

    filtered.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_line_per_gpu() {
        let text = "\
12, 11000, 1288, 12288, 41, NVIDIA GeForce RTX 3060
0, 24000, 576, 24576, 35, NVIDIA RTX A5000
";
        let gpus = parse_query_output(text);
        assert_eq!(gpus.len(), 2);
        assert_eq!(gpus[0].name, "NVIDIA GeForce RTX 3060");
        assert_eq!(gpus[0].load_percent, 12.0);
        assert_eq!(gpus[0].memory_free_mb, 11000.0);
        assert_eq!(gpus[0].memory_used_mb, 1288.0);
        assert_eq!(gpus[0].memory_total_mb, 12288.0);
        assert_eq!(gpus[0].temperature_celsius, 41.0);
        assert_eq!(gpus[1].memory_total_mb, 24576.0);
    }

    #[test]
    fn unsupported_fields_read_as_zero() {
        let gpus = parse_query_output("[N/A], 100, 20, 120, [N/A], Tesla T4\n");
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0].load_percent, 0.0);
        assert_eq!(gpus[0].temperature_celsius, 0.0);
        assert_eq!(gpus[0].memory_used_mb, 20.0);
    }

    #[test]
    fn names_with_commas_are_kept_whole() {
        let gpus = parse_query_output("1, 2, 3, 5, 40, Vendor, Model X\n");
        assert_eq!(gpus[0].name, "Vendor, Model X");
        assert_eq!(gpus[0].memory_total_mb, 5.0);

        let gpus = parse_query_output("1, 2, 3, 5, 40,  Vendor ,Model,,X  \n");
        assert_eq!(gpus[0].name, "Vendor ,Model,,X");
    }

    #[test]
    fn short_and_blank_lines_are_skipped() {
        assert!(parse_query_output("\n1, 2, 3\n").is_empty());
    }

    #[test]
    fn detect_fails_for_missing_binary() {
        assert!(NvidiaSmi::detect("/nonexistent/hostsnap-test/nvidia-smi").is_none());
    }

    #[test]
    fn loose_parse_accepts_decimal_comma() {
        assert_eq!(parse_f64_loose("12,5"), Some(12.5));
        assert_eq!(parse_f64_loose(" 7 %"), Some(7.0));
        assert_eq!(parse_f64_loose("n/a"), None);
    }
}
