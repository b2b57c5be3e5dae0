// ── Authoritative state snapshot ──
//
// Single writer (the session task), any number of readers. Readers load
// an `Arc<DeviceState>` without locking; every merge publishes a fresh
// snapshot, so a snapshot handed out earlier never changes underneath
// its holder.

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;
use tokio::sync::watch;

use super::state::{DeviceState, Frame};

pub struct StateStore {
    snapshot: ArcSwap<DeviceState>,
    /// A full document has been merged on the current session.
    synced: watch::Sender<bool>,
}

impl StateStore {
    pub fn new() -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            snapshot: ArcSwap::from_pointee(DeviceState::new()),
            synced,
        }
    }

    /// Overlay `frame` and return the keys whose value changed.
    pub fn merge(&self, frame: &Frame) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        if frame.is_empty() {
            return changed;
        }
        self.snapshot.rcu(|current| {
            let mut next = DeviceState::clone(current);
            changed = next.overlay(frame);
            next
        });
        changed
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.snapshot.load().get(key).cloned()
    }

    pub fn snapshot(&self) -> Arc<DeviceState> {
        self.snapshot.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Drop all state. Subscribers are not notified.
    pub fn clear(&self) {
        self.synced.send_replace(false);
        self.snapshot.store(Arc::new(DeviceState::new()));
    }

    /// True once a full frame has been merged since the last link loss.
    pub fn is_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Observe sync transitions.
    pub fn watch_synced(&self) -> watch::Receiver<bool> {
        self.synced.subscribe()
    }

    pub(crate) fn mark_synced(&self) {
        self.synced.send_replace(true);
    }

    /// Keep the values but stop treating them as current.
    pub fn mark_stale(&self) {
        self.synced.send_replace(false);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
