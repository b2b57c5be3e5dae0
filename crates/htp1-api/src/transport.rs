//! WebSocket session to the receiver with auto-reconnect.
//!
//! Owns exactly one connection to the HTP-1 controller endpoint and knows
//! nothing about what the frames mean: every inbound text frame is handed
//! to a [`SessionHandler`], outbound frames are queued through an
//! [`Outbox`]. After an unexpected drop the background task reconnects
//! with exponential backoff + jitter until cancelled.
//!
//! # Example
//!
//! ```rust,ignore
//! use htp1_api::transport::{controller_url, SessionOptions, Transport};
//!
//! let url = controller_url("192.168.1.50", 80)?;
//! let transport = Transport::connect(url, SessionOptions::default(), status, handler, cancel).await?;
//! transport.outbox().send("getmso".into())?;
//!
//! transport.disconnect().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Channel capacity ─────────────────────────────────────────────────

const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// Bound on flushing queued frames and closing on disconnect.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Path of the controller endpoint on the receiver's web server.
pub const CONTROLLER_PATH: &str = "/ws/controller";

// ── ConnectionStatus ─────────────────────────────────────────────────

/// Link state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Per-session tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Bound on the WebSocket upgrade plus greeting. Default: 10s.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ── SessionHandler ───────────────────────────────────────────────────

/// Receives everything the session loop observes.
///
/// Called inline on the receive task, so implementations must not block.
pub trait SessionHandler: Send + Sync + 'static {
    /// A session is being opened. The returned frames are written before
    /// the link is reported as connected.
    fn on_open(&self) -> Vec<String>;

    /// A text frame arrived.
    fn on_frame(&self, frame: &str);

    /// An established session ended without a local disconnect.
    fn on_link_lost(&self, error: &Error);
}

// ── Outbox ───────────────────────────────────────────────────────────

/// Cloneable send side of a live transport.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<String>,
    status: watch::Receiver<ConnectionStatus>,
}

impl Outbox {
    /// Queue a frame for the receiver. Never waits for a reply.
    pub fn send(&self, message: String) -> Result<(), Error> {
        if !self.status.borrow().is_connected() {
            return Err(Error::NotConnected);
        }
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => Error::Transport("outbound queue full".into()),
            TrySendError::Closed(_) => Error::NotConnected,
        })
    }
}

// ── Transport ────────────────────────────────────────────────────────

/// Handle to a running receiver session.
///
/// Dropping the handle cancels the background task; prefer
/// [`disconnect`](Self::disconnect) to also wait for it to finish.
pub struct Transport {
    url: Url,
    outbox: Outbox,
    status: Arc<watch::Sender<ConnectionStatus>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct SessionContext {
    url: Url,
    options: SessionOptions,
    status: Arc<watch::Sender<ConnectionStatus>>,
    handler: Arc<dyn SessionHandler>,
    cancel: CancellationToken,
}

impl Transport {
    /// Open the session and spawn the receive loop.
    ///
    /// Returns only after the first handshake succeeded. On failure the
    /// status is left at [`Disconnected`](ConnectionStatus::Disconnected)
    /// and nothing keeps running.
    pub async fn connect(
        url: Url,
        options: SessionOptions,
        status: Arc<watch::Sender<ConnectionStatus>>,
        handler: Arc<dyn SessionHandler>,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        status.send_replace(ConnectionStatus::Connecting);

        let first = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = open_session(&url, options.connect_timeout, handler.as_ref()) => result,
        };

        let ws = match first {
            Ok(ws) => ws,
            Err(e) => {
                status.send_replace(ConnectionStatus::Disconnected);
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        status.send_replace(ConnectionStatus::Connected);
        tracing::info!(url = %url, "receiver session established");

        let outbox = Outbox {
            tx,
            status: status.subscribe(),
        };
        let ctx = SessionContext {
            url: url.clone(),
            options,
            status: Arc::clone(&status),
            handler,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(session_loop(ws, rx, ctx));

        Ok(Self {
            url,
            outbox,
            status,
            cancel,
            task: Some(task),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Send side that outlives borrows of the transport.
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    pub fn send(&self, message: String) -> Result<(), Error> {
        self.outbox.send(message)
    }

    /// Stop the session (or a pending reconnect) and wait for the task.
    pub async fn disconnect(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "session task ended abnormally");
            }
        }
        self.status.send_replace(ConnectionStatus::Disconnected);
        tracing::info!(url = %self.url, "receiver session closed");
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build the controller endpoint URL for a receiver host.
pub fn controller_url(host: &str, port: u16) -> Result<Url, Error> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::InvalidAddress("host is empty".into()));
    }
    let authority = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    Url::parse(&format!("ws://{authority}{CONTROLLER_PATH}"))
        .map_err(|e| Error::InvalidAddress(format!("{host}: {e}")))
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Upgrade to WebSocket and write the greeting, all within `timeout`.
async fn open_session(
    url: &Url,
    timeout: Duration,
    handler: &dyn SessionHandler,
) -> Result<WsStream, Error> {
    tracing::debug!(url = %url, "connecting to receiver");

    let handshake = async {
        let (mut ws, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| connect_error(url, e))?;

        for greeting in handler.on_open() {
            ws.send(Message::text(greeting))
                .await
                .map_err(|e| connect_error(url, e))?;
        }
        Ok(ws)
    };

    match tokio::time::timeout(timeout, handshake).await {
        Ok(result) => result,
        Err(_) => Err(Error::ConnectionTimeout {
            address: url.to_string(),
            timeout,
        }),
    }
}

fn connect_error(url: &Url, err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::Url(e) => Error::InvalidAddress(e.to_string()),
        other => Error::ConnectionRefused {
            address: url.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Pump one established session until it drops or is cancelled.
///
/// `Ok(())` means the peer closed cleanly or we were cancelled. Frames
/// still queued at cancellation are flushed before the close frame.
async fn run_session(
    mut ws: WsStream,
    outbound: &mut mpsc::Receiver<String>,
    ctx: &SessionContext,
) -> Result<(), Error> {
    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                let goodbye = async {
                    while let Ok(message) = outbound.try_recv() {
                        ws.send(Message::text(message)).await?;
                    }
                    ws.close(None).await
                };
                match tokio::time::timeout(CLOSE_GRACE, goodbye).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!(error = %e, "session not closed cleanly"),
                    Err(_) => tracing::debug!("timed out flushing session on disconnect"),
                }
                return Ok(());
            }
            Some(message) = outbound.recv() => {
                tracing::debug!(frame = %message, "sending to receiver");
                ws.send(Message::text(message))
                    .await
                    .map_err(|e| Error::Transport(e.to_string()))?;
            }
            frame = ws.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        ctx.handler.on_frame(text.as_str());
                    }
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => ctx.handler.on_frame(text),
                        Err(_) => tracing::debug!(len = bytes.len(), "ignoring non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite queues the pong automatically
                        tracing::trace!("receiver ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "receiver sent close frame");
                        } else {
                            tracing::info!("receiver sent close frame (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(Error::Transport(e.to_string())),
                    None => {
                        tracing::info!("receiver stream ended");
                        return Ok(());
                    }
                }
            }
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: read → on drop, backoff → reconnect → read.
async fn session_loop(first: WsStream, mut outbound: mpsc::Receiver<String>, ctx: SessionContext) {
    let mut next = Some(first);
    let mut attempt: u32 = 0;

    loop {
        let ws = match next.take() {
            Some(ws) => ws,
            None => match reconnect(&ctx, &mut attempt).await {
                Some(ws) => ws,
                None => break,
            },
        };
        ctx.status.send_replace(ConnectionStatus::Connected);

        let result = run_session(ws, &mut outbound, &ctx).await;
        if ctx.cancel.is_cancelled() {
            break;
        }

        let error = match result {
            // Clean close from the receiver: reconnect without penalty.
            Ok(()) => {
                attempt = 0;
                Error::Transport("connection closed by receiver".into())
            }
            Err(e) => e,
        };
        tracing::warn!(error = %error, url = %ctx.url, "receiver session lost");

        let dropped = drain(&mut outbound);
        if dropped > 0 {
            tracing::debug!(dropped, "discarded frames queued for the lost session");
        }

        ctx.status
            .send_replace(ConnectionStatus::Reconnecting { attempt });
        ctx.handler.on_link_lost(&error);
    }

    ctx.status.send_replace(ConnectionStatus::Disconnected);
    tracing::debug!("session loop exiting");
}

/// Retry until a session opens, the retry budget runs out, or we are cancelled.
async fn reconnect(ctx: &SessionContext, attempt: &mut u32) -> Option<WsStream> {
    let reconnect = &ctx.options.reconnect;

    loop {
        if let Some(max) = reconnect.max_retries {
            if *attempt >= max {
                tracing::error!(max_retries = max, "reconnection limit reached, giving up");
                return None;
            }
        }

        ctx.status
            .send_replace(ConnectionStatus::Reconnecting { attempt: *attempt });
        let delay = calculate_backoff(*attempt, reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = *attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return None,
            () = tokio::time::sleep(delay) => {}
        }

        *attempt += 1;
        ctx.status.send_replace(ConnectionStatus::Connecting);

        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return None,
            result = open_session(&ctx.url, ctx.options.connect_timeout, ctx.handler.as_ref()) => result,
        };

        match result {
            Ok(ws) => {
                tracing::info!(attempts = *attempt, "receiver session re-established");
                *attempt = 0;
                return Some(ws);
            }
            Err(e) => tracing::warn!(error = %e, attempt = *attempt, "reconnect attempt failed"),
        }
    }
}

fn drain(outbound: &mut mpsc::Receiver<String>) -> usize {
    let mut dropped = 0;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25%, deterministic in the attempt number.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        // Jitter factor tops out at 1.25
        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_millis(12_500), "got {d10:?}");

        let huge = calculate_backoff(u32::MAX, &config);
        assert!(huge <= Duration::from_millis(12_500), "got {huge:?}");
    }

    #[test]
    fn controller_url_for_ipv4_host() {
        let url = controller_url("192.168.1.50", 80).unwrap();
        assert_eq!(url.as_str(), "ws://192.168.1.50/ws/controller");
    }

    #[test]
    fn controller_url_keeps_custom_port_and_brackets_ipv6() {
        let url = controller_url("fe80::1", 8080).unwrap();
        assert_eq!(url.as_str(), "ws://[fe80::1]:8080/ws/controller");
    }

    #[test]
    fn controller_url_rejects_empty_host() {
        assert!(matches!(
            controller_url("  ", 80),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn connection_status_connected_predicate() {
        assert!(ConnectionStatus::Connected.is_connected());
        assert!(!ConnectionStatus::Reconnecting { attempt: 0 }.is_connected());
        assert!(!ConnectionStatus::Disconnected.is_connected());
    }
}
