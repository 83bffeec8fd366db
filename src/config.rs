use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
const MAX_SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_sample_interval")]
    pub sample_interval: String,
    #[serde(default)]
    pub gpu: GpuConfig,
    #[serde(default)]
    pub thermal: ThermalConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GpuConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_nvidia_smi_path")]
    pub nvidia_smi_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThermalConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval: default_sample_interval(),
            gpu: GpuConfig::default(),
            thermal: ThermalConfig::default(),
        }
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            nvidia_smi_path: default_nvidia_smi_path(),
        }
    }
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.sample_interval()?;
        if interval < MIN_SAMPLE_INTERVAL || interval > MAX_SAMPLE_INTERVAL {
            return Err(ConfigError::Validation(format!(
                "sample_interval должно быть в диапазоне от {} до {}",
                humantime::format_duration(MIN_SAMPLE_INTERVAL),
                humantime::format_duration(MAX_SAMPLE_INTERVAL)
            )));
        }
        if self.gpu.nvidia_smi_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "gpu.nvidia_smi_path не должен быть пустым".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed CPU sampling window.
    pub fn sample_interval(&self) -> Result<Duration, ConfigError> {
        humantime::parse_duration(self.sample_interval.trim()).map_err(|err| {
            ConfigError::Validation(format!(
                "sample_interval '{}' не является корректной длительностью: {err}",
                self.sample_interval
            ))
        })
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn default_sample_interval() -> String {
    "1s".to_string()
}

const fn default_enabled() -> bool {
    true
}

fn default_nvidia_smi_path() -> String {
    "nvidia-smi".to_string()
}
