//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use htp1_config::ConfigError;
use htp1_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const UNREACHABLE: i32 = 3;
    pub const CONFIG: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connectivity ─────────────────────────────────────────────────
    #[error("Could not connect to the receiver at {address}")]
    #[diagnostic(
        code(htp1::unreachable),
        help(
            "Check that the receiver is powered and reachable on the network.\n\
             Reason: {reason}"
        )
    )]
    Unreachable { address: String, reason: String },

    #[error("Receiver at {address} did not respond within {millis}ms")]
    #[diagnostic(
        code(htp1::timeout),
        help("Increase the timeout with --timeout or check the receiver's network link.")
    )]
    Timeout { address: String, millis: u64 },

    #[error("Lost the connection to the receiver")]
    #[diagnostic(code(htp1::not_connected))]
    NotConnected,

    #[error("Transport error: {message}")]
    #[diagnostic(code(htp1::transport))]
    Transport { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(htp1::validation))]
    Validation { field: String, reason: String },

    #[error("Unknown {kind} '{value}'")]
    #[diagnostic(code(htp1::unknown_option), help("Available: {available}"))]
    UnknownOption {
        kind: String,
        value: String,
        available: String,
    },

    #[error("The receiver has not reported {key} yet")]
    #[diagnostic(
        code(htp1::state_unavailable),
        help("Wait until the receiver is online and try again.")
    )]
    StateUnavailable { key: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Device '{name}' not found in configuration")]
    #[diagnostic(
        code(htp1::device_not_found),
        help("Available devices: {available}\nConfig file: {path}")
    )]
    DeviceNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error("No receiver selected")]
    #[diagnostic(
        code(htp1::no_device),
        help(
            "Pass --host <address>, or add a [devices.<name>] profile to {path}\n\
             and set default_device."
        )
    )]
    NoDevice { path: String },

    #[error("Invalid configuration for {field}: {reason}")]
    #[diagnostic(code(htp1::config))]
    InvalidConfig { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(htp1::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(htp1::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } | Self::Timeout { .. } | Self::NotConnected => {
                exit_code::UNREACHABLE
            }
            Self::Validation { .. } | Self::UnknownOption { .. } | Self::StateUnavailable { .. } => {
                exit_code::USAGE
            }
            Self::DeviceNotFound { .. }
            | Self::NoDevice { .. }
            | Self::InvalidConfig { .. }
            | Self::Config(_) => exit_code::CONFIG,
            Self::Transport { .. } | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionRefused { address, reason } => {
                CliError::Unreachable { address, reason }
            }
            CoreError::ConnectionTimeout {
                address,
                timeout_ms,
            } => CliError::Timeout {
                address,
                millis: timeout_ms,
            },
            CoreError::NotConnected | CoreError::Cancelled => CliError::NotConnected,
            CoreError::InvalidArgument { message } => CliError::Validation {
                field: "argument".into(),
                reason: message,
            },
            CoreError::UnknownOption {
                kind,
                value,
                available,
            } => CliError::UnknownOption {
                kind: kind.into(),
                value,
                available: if available.is_empty() {
                    "(none reported)".into()
                } else {
                    available.join(", ")
                },
            },
            CoreError::StateUnavailable { key } => CliError::StateUnavailable { key: key.into() },
            CoreError::Transport { message } => CliError::Transport { message },
            CoreError::Config { message } => CliError::InvalidConfig {
                field: "address".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let path = htp1_config::config_path().display().to_string();
        match err {
            ConfigError::Validation { field, reason } => CliError::InvalidConfig { field, reason },
            ConfigError::UnknownDevice { name, available } => CliError::DeviceNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
                path,
            },
            ConfigError::NoDevice => CliError::NoDevice { path },
            other => CliError::Config(Box::new(other)),
        }
    }
}
