//! Shared configuration for HTP-1 tools.
//!
//! TOML device profiles layered under `HTP1_*` environment variables, and
//! translation to `htp1_core::DeviceConfig`. Read-only: nothing here
//! writes the config file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use htp1_core::DeviceConfig;
use htp1_core::config::DEFAULT_PORT;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no device profile named '{name}'")]
    UnknownDevice { name: String, available: Vec<String> },

    #[error("no device selected: pass --host or --device, or set default_device")]
    NoDevice,

    #[error("failed to render config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when no device is named on the command line.
    pub default_device: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named receiver profiles.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceProfile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout: default_timeout(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_timeout() -> u64 {
    10
}

/// One receiver.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// IP address or hostname.
    pub host: String,

    /// Display name; defaults to `Monoprice HTP-1 (<host>)`.
    pub name: Option<String>,

    pub port: Option<u16>,

    /// Override connect timeout (seconds).
    pub timeout: Option<u64>,

    /// Override volume step (dB).
    pub volume_step_db: Option<f64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "htp1", "htp1").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("htp1");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) layered under `HTP1_*` vars.
///
/// Nested keys use a double underscore: `HTP1_DEFAULTS__TIMEOUT=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    tracing::debug!(path = %path.display(), "loading config");
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HTP1_").split("__"))
        .extract()?;
    Ok(config)
}

/// Render the effective configuration as TOML.
pub fn render(config: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

// ── Device resolution ───────────────────────────────────────────────

/// Stable instance identifier for a receiver address.
pub fn identifier_for_host(host: &str) -> String {
    format!("htp1_{}", host.trim().replace('.', "_"))
}

impl Config {
    /// Look up a profile by name, or the default profile when `name` is `None`.
    pub fn device(&self, name: Option<&str>) -> Result<(&str, &DeviceProfile), ConfigError> {
        let name = name
            .or(self.default_device.as_deref())
            .ok_or(ConfigError::NoDevice)?;
        self.devices
            .get_key_value(name)
            .map(|(key, profile)| (key.as_str(), profile))
            .ok_or_else(|| ConfigError::UnknownDevice {
                name: name.to_owned(),
                available: self.devices.keys().cloned().collect(),
            })
    }

    /// Build the runtime config for a named profile.
    pub fn resolve_device(&self, name: Option<&str>) -> Result<DeviceConfig, ConfigError> {
        let (_, profile) = self.device(name)?;
        self.device_config(profile)
    }

    /// Runtime config for a profile, filling gaps from `[defaults]`.
    pub fn device_config(&self, profile: &DeviceProfile) -> Result<DeviceConfig, ConfigError> {
        let host = validate_host(&profile.host)?;
        let mut config = DeviceConfig::new(identifier_for_host(host), host);
        if let Some(name) = profile.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            config.name = name.to_owned();
        }
        config.port = profile.port.unwrap_or(self.defaults.port);
        config.connect_timeout =
            Duration::from_secs(profile.timeout.unwrap_or(self.defaults.timeout).max(1));
        if let Some(step) = profile.volume_step_db {
            if !step.is_finite() || step <= 0.0 {
                return Err(ConfigError::Validation {
                    field: "volume_step_db".into(),
                    reason: format!("must be a positive number of dB, got {step}"),
                });
            }
            config.volume_step_db = step;
        }
        Ok(config)
    }

    /// Runtime config for an ad-hoc address given on the command line.
    pub fn host_config(&self, host: &str, port: Option<u16>) -> Result<DeviceConfig, ConfigError> {
        self.device_config(&DeviceProfile {
            host: host.to_owned(),
            name: None,
            port,
            timeout: None,
            volume_step_db: None,
        })
    }
}

fn validate_host(host: &str) -> Result<&str, ConfigError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "IP address is required".into(),
        });
    }
    Ok(host)
}
