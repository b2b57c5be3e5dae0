// ── Device façade ──
//
// The one object consumers touch for a receiver: connection lifecycle,
// actions, state reads and subscriptions. Actions return once the
// request is queued; the effect is observed later through a
// `StateChanged` notification.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use htp1_api::{ConnectionStatus, Outbox, Transport};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::command::{self, Action, EncodeContext, MenuCommand};
use crate::config::DeviceConfig;
use crate::error::CoreError;
use crate::notification::Notification;
use crate::registry::{NotificationSink, SubscriberId};
use crate::session::{SessionBridge, Shared};
use crate::store::DeviceState;

// ── Device ───────────────────────────────────────────────────────

/// Handle to one HTP-1.
///
/// Cheaply cloneable via `Arc<DeviceInner>`; clones share the connection,
/// state and subscribers.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    config: DeviceConfig,
    shared: Arc<Shared>,
    /// At most one live transport.
    transport: Mutex<Option<Transport>>,
    /// Send side of the live transport, readable without the async lock.
    outbox: ArcSwapOption<Outbox>,
    /// Cancels the connect attempt (and session) in progress.
    attempt: ArcSwap<CancellationToken>,
}

impl Device {
    /// Create a device handle. Does NOT connect.
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                config,
                shared: Arc::new(Shared::new()),
                transport: Mutex::new(None),
                outbox: ArcSwapOption::empty(),
                attempt: ArcSwap::from_pointee(CancellationToken::new()),
            }),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    pub fn identifier(&self) -> &str {
        &self.inner.config.identifier
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open the session to the receiver.
    ///
    /// Any previous session is torn down first. Returns once the
    /// WebSocket is up and the state request is on the wire; the state
    /// itself arrives asynchronously as a full resync.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let url = self.inner.config.url()?;
        let mut slot = self.inner.transport.lock().await;
        let shared = &self.inner.shared;

        let replaced = slot.take();
        let was_available = replaced.is_some() && shared.is_available();
        if let Some(previous) = replaced {
            debug!("replacing existing receiver session");
            self.inner.outbox.store(None);
            previous.disconnect().await;
            shared.store.mark_stale();
        }

        let cancel = CancellationToken::new();
        self.inner.attempt.store(Arc::new(cancel.clone()));

        let bridge = Arc::new(SessionBridge::new(Arc::clone(shared)));
        let connected = Transport::connect(
            url,
            self.inner.config.session_options(),
            Arc::clone(&shared.status),
            bridge,
            cancel,
        )
        .await;

        let transport = match connected {
            Ok(transport) => transport,
            Err(e) => {
                if was_available {
                    shared.publish(Notification::Availability { connected: false });
                }
                shared.store.clear();
                return Err(e.into());
            }
        };

        self.inner.outbox.store(Some(Arc::new(transport.outbox())));
        *slot = Some(transport);
        info!(device = %self.inner.config.identifier, "connected to receiver");
        Ok(())
    }

    /// Close the session, including any reconnect in progress.
    ///
    /// Every subscriber gets `Availability { connected: false }`, then the
    /// snapshot is cleared. Safe to call repeatedly or before `connect`.
    pub async fn disconnect(&self) {
        self.teardown().await;

        let shared = &self.inner.shared;
        shared.publish(Notification::Availability { connected: false });
        shared.store.clear();
        info!(device = %self.inner.config.identifier, "disconnected from receiver");
    }

    /// Stop the session and any reconnect, leaving status `Disconnected`.
    async fn teardown(&self) {
        self.inner.attempt.load().cancel();

        let previous = self.inner.transport.lock().await.take();
        self.inner.outbox.store(None);
        if let Some(transport) = previous {
            transport.disconnect().await;
        }

        let shared = &self.inner.shared;
        shared.status.send_replace(ConnectionStatus::Disconnected);
        shared.store.mark_stale();
    }

    /// Undo a connect whose first document never arrived. Subscribers
    /// hear about it only if they were told the device was available.
    async fn abandon(&self, announced: bool) {
        self.teardown().await;

        let shared = &self.inner.shared;
        if announced {
            shared.publish(Notification::Availability { connected: false });
        }
        shared.store.clear();
        debug!(device = %self.inner.config.identifier, "abandoned unsynchronized session");
    }

    /// Connect and wait until the first full document has been merged.
    ///
    /// Both steps share the configured connect timeout. On failure no
    /// session is left behind and status is `Disconnected`.
    pub async fn connect_and_sync(&self) -> Result<Arc<DeviceState>, CoreError> {
        let deadline = tokio::time::Instant::now() + self.inner.config.connect_timeout;
        let was_available = self.is_available();

        match tokio::time::timeout_at(deadline, self.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                self.abandon(was_available).await;
                return Err(self.timeout_error());
            }
        }

        let mut synced = self.inner.shared.store.watch_synced();
        let waited = tokio::time::timeout_at(deadline, synced.wait_for(|is_synced| *is_synced))
            .await
            .map(|changed| changed.is_ok());
        match waited {
            Ok(true) => Ok(self.snapshot()),
            Ok(false) => {
                self.abandon(was_available).await;
                Err(CoreError::NotConnected)
            }
            Err(_) => {
                self.abandon(was_available).await;
                Err(self.timeout_error())
            }
        }
    }

    fn timeout_error(&self) -> CoreError {
        let timeout = self.inner.config.connect_timeout;
        CoreError::ConnectionTimeout {
            address: self.address(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// One-shot: connect, sync, run closure, disconnect.
    pub async fn oneshot<F, Fut, T>(config: DeviceConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Device) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let device = Device::new(config);
        let result = match device.connect_and_sync().await {
            Ok(_) => f(device.clone()).await,
            Err(e) => Err(e),
        };
        device.disconnect().await;
        result
    }

    /// Connectivity test: reach the receiver, read its state, hang up.
    pub async fn probe(config: DeviceConfig) -> Result<Arc<DeviceState>, CoreError> {
        Self::oneshot(config, |device| async move { Ok(device.snapshot()) }).await
    }

    fn address(&self) -> String {
        self.inner
            .config
            .url()
            .map_or_else(|_| self.inner.config.host.clone(), |url| url.to_string())
    }

    // ── State observation ────────────────────────────────────────

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.shared.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.shared.status.subscribe()
    }

    /// Connected and holding a full state document from this session.
    pub fn is_available(&self) -> bool {
        self.inner.shared.is_available()
    }

    /// Immutable snapshot of the current state.
    pub fn snapshot(&self) -> Arc<DeviceState> {
        self.inner.shared.store.snapshot()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.shared.store.get(key)
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Register a notification sink under `id`, replacing any previous one.
    ///
    /// If the receiver is available the sink immediately gets
    /// `Availability { connected: true }` followed by a full resync.
    pub fn register_subscriber(&self, id: impl Into<SubscriberId>, sink: NotificationSink) -> bool {
        let shared = &self.inner.shared;
        shared.registry.register(id.into(), sink, || shared.initial())
    }

    /// Register with a fresh channel sized by `subscriber_buffer`.
    pub fn subscribe(&self, id: impl Into<SubscriberId>) -> mpsc::Receiver<Arc<Notification>> {
        let (sink, receiver) = mpsc::channel(self.inner.config.subscriber_buffer.max(1));
        self.register_subscriber(id, sink);
        receiver
    }

    pub fn unregister_subscriber(&self, id: &SubscriberId) -> bool {
        self.inner.shared.registry.unregister(id)
    }

    // ── Actions ──────────────────────────────────────────────────

    /// Validate, encode and queue `action`.
    ///
    /// `Ok` means accepted for transmission, not applied.
    pub fn execute(&self, action: &Action) -> Result<(), CoreError> {
        let store = &self.inner.shared.store;
        let snapshot = store.snapshot();
        let ctx = EncodeContext {
            state: &snapshot,
            synced: store.is_synced(),
            volume_step_db: self.inner.config.volume_step_db,
        };
        let requests = command::encode(action, &ctx)?;

        let outbox = self.inner.outbox.load_full().ok_or(CoreError::NotConnected)?;
        for request in &requests {
            outbox.send(request.encode())?;
        }
        debug!(action = action.name(), "command queued");
        Ok(())
    }

    pub fn turn_on(&self) -> Result<(), CoreError> {
        self.execute(&Action::TurnOn)
    }

    pub fn turn_off(&self) -> Result<(), CoreError> {
        self.execute(&Action::TurnOff)
    }

    pub fn power_toggle(&self) -> Result<(), CoreError> {
        self.execute(&Action::PowerToggle)
    }

    /// Set volume from a normalized level in `[0.0, 1.0]`.
    pub fn set_volume(&self, level: f64) -> Result<(), CoreError> {
        self.execute(&Action::SetVolume(level))
    }

    pub fn volume_up(&self) -> Result<(), CoreError> {
        self.execute(&Action::VolumeUp)
    }

    pub fn volume_down(&self) -> Result<(), CoreError> {
        self.execute(&Action::VolumeDown)
    }

    pub fn mute(&self, muted: bool) -> Result<(), CoreError> {
        self.execute(&Action::Mute(muted))
    }

    pub fn mute_toggle(&self) -> Result<(), CoreError> {
        self.execute(&Action::MuteToggle)
    }

    pub fn select_source(&self, label: &str) -> Result<(), CoreError> {
        self.execute(&Action::SelectSource(label.to_owned()))
    }

    pub fn select_sound_mode(&self, name: &str) -> Result<(), CoreError> {
        self.execute(&Action::SelectSoundMode(name.to_owned()))
    }

    pub fn send_menu_command(&self, command: MenuCommand) -> Result<(), CoreError> {
        self.execute(&Action::Menu(command))
    }
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        self.attempt.load().cancel();
    }
}
