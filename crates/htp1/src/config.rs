//! CLI-side device resolution: config file + environment, then flag overrides.

use std::time::Duration;

use htp1_core::DeviceConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Build the `DeviceConfig` for this invocation.
///
/// `--host` wins over any profile; otherwise `--device` (or the configured
/// default) names a profile. `--port` and `--timeout` override either.
pub fn device_config(global: &GlobalOpts) -> Result<DeviceConfig, CliError> {
    let cfg = htp1_config::load_config()?;

    let mut device = match global.host.as_deref() {
        Some(host) => cfg.host_config(host, global.port)?,
        None => {
            let mut device = cfg.resolve_device(global.device.as_deref())?;
            if let Some(port) = global.port {
                device.port = port;
            }
            device
        }
    };

    if let Some(secs) = global.timeout {
        device.connect_timeout = Duration::from_secs(secs.max(1));
    }
    tracing::debug!(
        device = %device.identifier,
        host = %device.host,
        port = device.port,
        "resolved receiver"
    );
    Ok(device)
}
