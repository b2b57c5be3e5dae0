//! Read-side commands: probe, state, watch.

use serde::Serialize;

use htp1_core::{Device, DeviceConfig, DeviceState};

use crate::cli::{GlobalOpts, OutputFormat, StateArgs, WatchArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ProbeReport<'a> {
    identifier: &'a str,
    name: &'a str,
    host: &'a str,
    port: u16,
    state: &'a DeviceState,
}

pub async fn probe(config: DeviceConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let state = Device::probe(config.clone()).await?;
    let rendered = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let report = ProbeReport {
                identifier: &config.identifier,
                name: &config.name,
                host: &config.host,
                port: config.port,
                state: &state,
            };
            if matches!(global.output, OutputFormat::Json) {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            }
        }
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{} reachable at {}:{} ({} state keys)",
            config.name,
            config.host,
            config.port,
            state.len()
        ),
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn show(
    config: DeviceConfig,
    args: StateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let state = Device::oneshot(config, |device| async move { Ok(device.snapshot()) }).await?;

    let rendered = match args.key {
        Some(key) => {
            let value = state.get(&key).ok_or_else(|| CliError::Validation {
                field: "key".into(),
                reason: format!(
                    "'{key}' is not reported (known keys: {})",
                    state.keys().collect::<Vec<_>>().join(", ")
                ),
            })?;
            output::render_value(global.output, value)?
        }
        None => output::render_state(global.output, &state, output::should_color(global.color))?,
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn watch(
    config: DeviceConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let device = Device::new(config);
    let mut notifications = device.subscribe("htp1-cli");

    if let Err(err) = device.connect_and_sync().await {
        device.disconnect().await;
        return Err(err.into());
    }

    let mut seen = 0usize;
    let result = loop {
        if args.count.is_some_and(|limit| seen >= limit) {
            break Ok(());
        }
        tokio::select! {
            received = notifications.recv() => {
                let Some(notification) = received else {
                    break Ok(());
                };
                seen += 1;
                match output::render_notification(global.output, &notification, color) {
                    Ok(line) => output::print_output(&line, global.quiet),
                    Err(e) => break Err(e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("interrupted");
                break Ok(());
            }
        }
    };

    device.disconnect().await;
    result
}
