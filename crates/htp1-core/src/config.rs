// ── Runtime device configuration ──
//
// Describes *how* to reach one receiver and how the session behaves.
// Never touches disk: the CLI (or any other host) builds a
// `DeviceConfig` and hands it in.

use std::time::Duration;

use htp1_api::transport::{self, ReconnectConfig, SessionOptions};
use url::Url;

use crate::error::CoreError;

/// HTTP port the receiver serves its controller endpoint on.
pub const DEFAULT_PORT: u16 = 80;

/// Bound on the WebSocket upgrade plus first request.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-subscriber notification queue depth.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Volume change for a single up/down step.
pub const DEFAULT_VOLUME_STEP_DB: f64 = 1.0;

/// Configuration for one receiver instance.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Stable instance id, e.g. `htp1_192_168_1_50`.
    pub identifier: String,
    /// Human-readable name.
    pub name: String,
    /// Hostname or IP address.
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub subscriber_buffer: usize,
    pub volume_step_db: f64,
}

impl DeviceConfig {
    /// Config with defaults for everything but the address.
    pub fn new(identifier: impl Into<String>, host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            identifier: identifier.into(),
            name: default_name(&host),
            host,
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectConfig::default(),
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            volume_step_db: DEFAULT_VOLUME_STEP_DB,
        }
    }

    /// Controller endpoint, `ws://{host}:{port}/ws/controller`.
    pub fn url(&self) -> Result<Url, CoreError> {
        Ok(transport::controller_url(&self.host, self.port)?)
    }

    pub(crate) fn session_options(&self) -> SessionOptions {
        SessionOptions {
            connect_timeout: self.connect_timeout,
            reconnect: self.reconnect.clone(),
        }
    }
}

/// Name used when the user does not supply one.
pub fn default_name(host: &str) -> String {
    format!("Monoprice HTP-1 ({host})")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DeviceConfig::new("htp1_10_0_0_5", "10.0.0.5");
        assert_eq!(config.name, "Monoprice HTP-1 (10.0.0.5)");
        assert_eq!(config.port, 80);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.subscriber_buffer, 64);
        assert!((config.volume_step_db - 1.0).abs() < f64::EPSILON);
        assert!(config.reconnect.max_retries.is_none());
    }

    #[test]
    fn url_targets_controller_endpoint() {
        let mut config = DeviceConfig::new("htp1", "10.0.0.5");
        config.port = 8080;
        assert_eq!(
            config.url().unwrap().as_str(),
            "ws://10.0.0.5:8080/ws/controller"
        );
    }

    #[test]
    fn empty_host_is_config_error() {
        let config = DeviceConfig::new("htp1", "");
        assert!(matches!(config.url(), Err(CoreError::Config { .. })));
    }
}
