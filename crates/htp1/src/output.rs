//! Output formatting: table, JSON, plain.
//!
//! Table uses `tabled`, structured formats use serde, plain emits
//! `key=value` lines for scripting.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde_json::Value;
use tabled::{Table, Tabled, settings::Style};

use htp1_core::{DeviceState, Notification, StateChange};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Human-readable rendering of a state value: strings unquoted, lists joined.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        Value::Null => "-".into(),
        other => other.to_string(),
    }
}

/// Render a full state snapshot.
pub fn render_state(
    format: OutputFormat,
    state: &DeviceState,
    color: bool,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<StateRow> = state
                .as_map()
                .iter()
                .map(|(key, value)| StateRow {
                    key: paint_key(key, color),
                    value: display_value(value),
                })
                .collect();
            Table::new(rows).with(Style::rounded()).to_string()
        }
        OutputFormat::Json => serde_json::to_string_pretty(state)?,
        OutputFormat::JsonCompact => serde_json::to_string(state)?,
        OutputFormat::Plain => state
            .as_map()
            .iter()
            .map(|(key, value)| format!("{key}={}", display_value(value)))
            .collect::<Vec<_>>()
            .join("\n"),
    })
}

/// Render one value looked up by key.
pub fn render_value(format: OutputFormat, value: &Value) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::JsonCompact => serde_json::to_string(value)?,
        OutputFormat::Table | OutputFormat::Plain => display_value(value),
    })
}

/// One line per notification, suitable for streaming.
pub fn render_notification(
    format: OutputFormat,
    notification: &Notification,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => Ok(serde_json::to_string(notification)?),
        OutputFormat::Table | OutputFormat::Plain => Ok(match notification {
            Notification::Availability { connected: true } => tag("online", color, true),
            Notification::Availability { connected: false } => tag("offline", color, false),
            Notification::StateChanged(change) => describe_change(change, color),
        }),
    }
}

fn describe_change(change: &StateChange, color: bool) -> String {
    let label = if change.full_resync { "sync" } else { "change" };
    let pairs = change
        .values
        .iter()
        .map(|(key, value)| format!("{}={}", paint_key(key, color), display_value(value)))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {pairs}", tag(label, color, true))
}

fn tag(label: &str, color: bool, good: bool) -> String {
    let text = format!("[{label}]");
    match (color, good) {
        (false, _) => text,
        (true, true) => text.green().to_string(),
        (true, false) => text.red().to_string(),
    }
}

fn paint_key(key: &str, color: bool) -> String {
    if color {
        key.cyan().to_string()
    } else {
        key.to_owned()
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
