// ── Subscriber notifications ──
//
// The two events every subscriber sink receives. One merged frame
// produces at most one `StateChanged`; keys and values travel together.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::store::DeviceState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    StateChanged(StateChange),
    Availability { connected: bool },
}

/// Changed keys and their new values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub keys: BTreeSet<String>,
    pub values: BTreeMap<String, Value>,
    /// Carries the entire snapshot rather than an increment.
    pub full_resync: bool,
}

impl StateChange {
    /// Increment for `keys`, with values read from `state`.
    pub fn incremental(state: &DeviceState, keys: BTreeSet<String>) -> Self {
        let values = keys
            .iter()
            .filter_map(|key| state.get(key).map(|value| (key.clone(), value.clone())))
            .collect();
        Self {
            keys,
            values,
            full_resync: false,
        }
    }

    /// Everything in `state`.
    pub fn full(state: &DeviceState) -> Self {
        Self {
            keys: state.keys().map(str::to_owned).collect(),
            values: state.as_map().clone(),
            full_resync: true,
        }
    }
}

impl Notification {
    pub fn is_full_resync(&self) -> bool {
        matches!(self, Self::StateChanged(change) if change.full_resync)
    }
}
