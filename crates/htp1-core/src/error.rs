// ── Core error types ──
//
// User-facing errors from htp1-core. Consumers never see WebSocket or
// JSON failures directly; the `From<htp1_api::Error>` impl translates
// transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Connection to receiver at {address} timed out after {timeout_ms}ms")]
    ConnectionTimeout { address: String, timeout_ms: u64 },

    #[error("Receiver at {address} refused the connection: {reason}")]
    ConnectionRefused { address: String, reason: String },

    #[error("Not connected to the receiver")]
    NotConnected,

    #[error("Connection attempt cancelled by disconnect")]
    Cancelled,

    // ── Validation errors ────────────────────────────────────────────
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Unknown {kind} \"{value}\" (available: {})", available.join(", "))]
    UnknownOption {
        kind: &'static str,
        value: String,
        available: Vec<String>,
    },

    #[error("Receiver state unavailable: {key} is not known yet")]
    StateUnavailable { key: &'static str },

    // ── Session errors ───────────────────────────────────────────────
    #[error("Transport error: {message}")]
    Transport { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Rejected before anything was sent; retrying unchanged will fail again.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::UnknownOption { .. } | Self::StateUnavailable { .. }
        )
    }

    /// The receiver could not be reached (setup / connectivity test failure).
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::ConnectionRefused { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<htp1_api::Error> for CoreError {
    fn from(err: htp1_api::Error) -> Self {
        match err {
            htp1_api::Error::ConnectionTimeout { address, timeout } => CoreError::ConnectionTimeout {
                address,
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            htp1_api::Error::ConnectionRefused { address, reason } => {
                CoreError::ConnectionRefused { address, reason }
            }
            htp1_api::Error::NotConnected => CoreError::NotConnected,
            htp1_api::Error::Cancelled => CoreError::Cancelled,
            htp1_api::Error::InvalidAddress(message) => CoreError::Config { message },
            htp1_api::Error::Transport(message) | htp1_api::Error::Protocol { message, .. } => {
                CoreError::Transport { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeout_converts_to_millis() {
        let err = CoreError::from(htp1_api::Error::ConnectionTimeout {
            address: "ws://10.0.0.5/ws/controller".into(),
            timeout: Duration::from_secs(10),
        });
        assert!(matches!(
            err,
            CoreError::ConnectionTimeout { timeout_ms: 10_000, .. }
        ));
        assert!(err.is_unreachable());
    }

    #[test]
    fn unknown_option_lists_alternatives() {
        let err = CoreError::UnknownOption {
            kind: "source",
            value: "Tape".into(),
            available: vec!["HDMI 1".into(), "Optical".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown source \"Tape\" (available: HDMI 1, Optical)"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn invalid_address_is_a_config_error() {
        let err = CoreError::from(htp1_api::Error::InvalidAddress("host is empty".into()));
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
