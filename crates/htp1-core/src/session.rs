// ── Session bridge ──
//
// Glue between the semantic-free transport and the device model. Runs
// inline on the transport's receive task: decode → mirror → project →
// merge → fan-out. Nothing here blocks; slow subscribers are handled by
// the registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use htp1_api::mso::MsoMirror;
use htp1_api::{ConnectionStatus, Inbound, PatchOp, Request, SessionHandler};
use serde_json::Value;
use tokio::sync::watch;

use crate::notification::{Notification, StateChange};
use crate::registry::SubscriberRegistry;
use crate::store::{StateStore, project_full, project_partial};

/// State shared by the façade and the session bridge.
pub(crate) struct Shared {
    pub(crate) store: StateStore,
    pub(crate) registry: SubscriberRegistry,
    pub(crate) status: Arc<watch::Sender<ConnectionStatus>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            store: StateStore::new(),
            registry: SubscriberRegistry::new(),
            status: Arc::new(status),
        }
    }

    /// Link is up and the store holds a full document from this session.
    pub(crate) fn is_available(&self) -> bool {
        self.status.borrow().is_connected() && self.store.is_synced()
    }

    /// What a subscriber that missed notifications needs to be current.
    pub(crate) fn catch_up(&self) -> Vec<Notification> {
        let connected = self.is_available();
        let mut batch = vec![Notification::Availability { connected }];
        if connected {
            let snapshot = self.store.snapshot();
            if !snapshot.is_empty() {
                batch.push(Notification::StateChanged(StateChange::full(&snapshot)));
            }
        }
        batch
    }

    /// Initial notifications for a new subscriber; nothing until available.
    pub(crate) fn initial(&self) -> Vec<Notification> {
        if self.is_available() {
            self.catch_up()
        } else {
            Vec::new()
        }
    }

    pub(crate) fn publish(&self, notification: Notification) {
        self.registry.publish(notification, || self.catch_up());
    }

    /// Mark the store synced and announce it, atomically with respect to
    /// new registrations so a subscriber never gets two full resyncs.
    pub(crate) fn publish_synced(&self, batch: Vec<Notification>) {
        self.registry
            .publish_batch(batch, || self.store.mark_synced(), || self.catch_up());
    }
}

/// Per-connection handler that keeps the MSO mirror.
pub(crate) struct SessionBridge {
    shared: Arc<Shared>,
    mirror: Mutex<MsoMirror>,
    /// No full document merged since the session (re)opened.
    awaiting_full: AtomicBool,
}

impl SessionBridge {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            mirror: Mutex::new(MsoMirror::new()),
            awaiting_full: AtomicBool::new(true),
        }
    }

    fn mirror(&self) -> MutexGuard<'_, MsoMirror> {
        self.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_full_document(&self, doc: Value) {
        let frame = project_full(&doc);
        self.mirror().reset(doc);

        let store = &self.shared.store;
        let changed = store.merge(&frame);

        if self.awaiting_full.swap(false, Ordering::SeqCst) {
            tracing::info!(keys = frame.len(), "receiver state synchronized");
            let snapshot = store.snapshot();
            self.shared.publish_synced(vec![
                Notification::Availability { connected: true },
                Notification::StateChanged(StateChange::full(&snapshot)),
            ]);
        } else {
            store.mark_synced();
            if !changed.is_empty() {
                self.publish_changes(changed);
            }
        }
    }

    fn on_delta(&self, ops: &[PatchOp]) {
        let frame = {
            let mut mirror = self.mirror();
            if mirror.apply(ops) == 0 {
                return;
            }
            match mirror.document() {
                Some(doc) => project_partial(doc, ops),
                None => return,
            }
        };

        let changed = self.shared.store.merge(&frame);
        if changed.is_empty() {
            tracing::trace!(ops = ops.len(), "update produced no state change");
            return;
        }
        self.publish_changes(changed);
    }

    fn publish_changes(&self, changed: std::collections::BTreeSet<String>) {
        tracing::debug!(?changed, "receiver state changed");
        let snapshot = self.shared.store.snapshot();
        self.shared.publish(Notification::StateChanged(StateChange::incremental(
            &snapshot, changed,
        )));
    }
}

impl SessionHandler for SessionBridge {
    fn on_open(&self) -> Vec<String> {
        self.mirror().clear();
        self.awaiting_full.store(true, Ordering::SeqCst);
        vec![Request::GetMso.encode()]
    }

    fn on_frame(&self, frame: &str) {
        match Inbound::parse(frame) {
            Ok(Inbound::Mso(doc)) => self.on_full_document(doc),
            Ok(Inbound::MsoUpdate(ops)) => self.on_delta(&ops),
            Ok(Inbound::Other { verb }) => tracing::trace!(verb, "ignoring frame"),
            Err(e) => tracing::warn!(error = %e, "dropping malformed frame"),
        }
    }

    fn on_link_lost(&self, error: &htp1_api::Error) {
        tracing::warn!(error = %error, "receiver unavailable, reconnecting");
        self.shared.store.mark_stale();
        self.mirror().clear();
        self.shared
            .publish(Notification::Availability { connected: false });
    }
}
