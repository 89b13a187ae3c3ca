//! Host configuration management

use crate::usb::{ClientConfig, HostSettings, InstallConfig};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest bounded wait the pump may be configured with
const MAX_EVENT_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub pump: PumpSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSection {
    #[serde(default = "HostSection::default_log_level")]
    pub log_level: String,
    /// Verbose logging inside libusb
    #[serde(default)]
    pub backend_debug: bool,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            backend_debug: false,
        }
    }
}

impl HostSection {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSection {
    /// Depth of the hot-plug event queue
    #[serde(default = "ClientSection::default_max_num_event_msg")]
    pub max_num_event_msg: usize,
    /// Report devices already attached at startup
    #[serde(default = "ClientSection::default_enumerate_attached")]
    pub enumerate_attached: bool,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            max_num_event_msg: Self::default_max_num_event_msg(),
            enumerate_attached: Self::default_enumerate_attached(),
        }
    }
}

impl ClientSection {
    fn default_max_num_event_msg() -> usize {
        5
    }

    fn default_enumerate_attached() -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpSettings {
    #[serde(default = "PumpSettings::default_event_timeout")]
    pub host_event_timeout_ms: u64,
    #[serde(default = "PumpSettings::default_event_timeout")]
    pub client_event_timeout_ms: u64,
    /// Delay between two pumps in the main loop
    #[serde(default = "PumpSettings::default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            host_event_timeout_ms: Self::default_event_timeout(),
            client_event_timeout_ms: Self::default_event_timeout(),
            poll_interval_ms: Self::default_poll_interval(),
        }
    }
}

impl PumpSettings {
    fn default_event_timeout() -> u64 {
        1
    }

    fn default_poll_interval() -> u64 {
        10
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// How enumerated configurations are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Field-by-field dump through the log
    #[default]
    Text,
    /// One JSON document per configuration on stdout
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: OutputFormat,
}

impl HostConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/usbh-enum/host.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usbh-enum").join("host.toml")
        } else {
            PathBuf::from(".config/usbh-enum/host.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.host.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.host.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.client.max_num_event_msg == 0 {
            return Err(anyhow!("client.max_num_event_msg must be at least 1"));
        }

        if self.pump.poll_interval_ms == 0 {
            return Err(anyhow!("pump.poll_interval_ms must be at least 1"));
        }

        for (name, value) in [
            ("host_event_timeout_ms", self.pump.host_event_timeout_ms),
            ("client_event_timeout_ms", self.pump.client_event_timeout_ms),
        ] {
            if value > MAX_EVENT_TIMEOUT_MS {
                return Err(anyhow!(
                    "pump.{} is {} ms, maximum is {} ms",
                    name,
                    value,
                    MAX_EVENT_TIMEOUT_MS
                ));
            }
        }

        Ok(())
    }

    /// Settings for [`UsbHost::setup`](crate::usb::UsbHost::setup)
    pub fn host_settings(&self) -> HostSettings {
        HostSettings {
            install: InstallConfig {
                debug: self.host.backend_debug,
            },
            client: ClientConfig {
                max_num_event_msg: self.client.max_num_event_msg,
                enumerate_attached: self.client.enumerate_attached,
            },
            host_event_timeout: Duration::from_millis(self.pump.host_event_timeout_ms),
            client_event_timeout: Duration::from_millis(self.pump.client_event_timeout_ms),
        }
    }
}

/// Load a configuration file, expanding a leading `~`
pub fn load_config(path: &str) -> Result<HostConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    HostConfig::load(Some(path_buf))
}
