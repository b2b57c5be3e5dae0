use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `htp1-api` crate.
///
/// Covers the transport lifecycle (connect, send, session loss) and
/// wire-level decoding. `htp1-core` maps these into user-facing variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// The WebSocket upgrade or greeting did not finish in time.
    #[error("Connection to {address} timed out after {}ms", timeout.as_millis())]
    ConnectionTimeout { address: String, timeout: Duration },

    /// The peer rejected the session or could not be reached.
    #[error("Connection to {address} refused: {reason}")]
    ConnectionRefused { address: String, reason: String },

    /// A send was attempted without a live session.
    #[error("Not connected to the receiver")]
    NotConnected,

    /// The connect attempt was cancelled by an explicit disconnect.
    #[error("Connection attempt cancelled")]
    Cancelled,

    /// The receiver address could not be turned into a WebSocket URL.
    #[error("Invalid receiver address: {0}")]
    InvalidAddress(String),

    // ── Session ─────────────────────────────────────────────────────
    /// Mid-session I/O failure or unexpected close.
    #[error("Transport error: {0}")]
    Transport(String),

    // ── Data ────────────────────────────────────────────────────────
    /// A frame did not match the expected `verb payload` shape.
    #[error("Protocol error: {message}")]
    Protocol { message: String, frame: String },
}
