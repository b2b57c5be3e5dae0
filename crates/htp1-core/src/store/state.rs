// ── Flat device state ──
//
// The receiver-agnostic view of an HTP-1: a small set of well-known keys
// with JSON values. Produced by projecting the MSO document, overlaid by
// the store, handed to subscribers as-is.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

/// A (possibly partial) set of key/value pairs to overlay.
pub type Frame = BTreeMap<String, Value>;

/// Well-known state keys.
pub mod keys {
    pub const POWER: &str = "power";
    /// Normalized level in `[0.0, 1.0]`.
    pub const VOLUME: &str = "volume";
    pub const VOLUME_DB: &str = "volume_db";
    pub const VOLUME_MIN_DB: &str = "volume_min_db";
    pub const VOLUME_MAX_DB: &str = "volume_max_db";
    pub const MUTED: &str = "muted";
    /// Display label of the active input.
    pub const SOURCE: &str = "source";
    pub const SOURCE_LIST: &str = "source_list";
    /// Display label → receiver input code.
    pub const SOURCE_CODES: &str = "source_codes";
    /// Display name of the active upmix mode.
    pub const SOUND_MODE: &str = "sound_mode";
    pub const SOUND_MODE_LIST: &str = "sound_mode_list";
}

/// Immutable snapshot of everything the receiver has reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeviceState {
    values: BTreeMap<String, Value>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Overlay `frame`, returning the keys whose value actually changed.
    pub(crate) fn overlay(&mut self, frame: &Frame) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        for (key, value) in frame {
            if self.values.get(key) != Some(value) {
                self.values.insert(key.clone(), value.clone());
                changed.insert(key.clone());
            }
        }
        changed
    }

    // ── Typed accessors ──────────────────────────────────────────────

    pub fn power(&self) -> Option<bool> {
        self.get(keys::POWER).and_then(Value::as_bool)
    }

    pub fn volume(&self) -> Option<f64> {
        self.get(keys::VOLUME).and_then(Value::as_f64)
    }

    pub fn volume_db(&self) -> Option<f64> {
        self.get(keys::VOLUME_DB).and_then(Value::as_f64)
    }

    /// Calibrated `(min, max)` volume range in dB, if advertised.
    pub fn volume_range_db(&self) -> Option<(f64, f64)> {
        let min = self.get(keys::VOLUME_MIN_DB).and_then(Value::as_f64)?;
        let max = self.get(keys::VOLUME_MAX_DB).and_then(Value::as_f64)?;
        Some((min, max))
    }

    pub fn muted(&self) -> Option<bool> {
        self.get(keys::MUTED).and_then(Value::as_bool)
    }

    pub fn source(&self) -> Option<&str> {
        self.get(keys::SOURCE).and_then(Value::as_str)
    }

    /// Advertised input labels; empty when none are known.
    pub fn source_list(&self) -> Vec<&str> {
        string_list(self.get(keys::SOURCE_LIST))
    }

    /// Receiver input code for a display label.
    pub fn source_code(&self, label: &str) -> Option<&str> {
        self.get(keys::SOURCE_CODES)?.get(label)?.as_str()
    }

    pub fn sound_mode(&self) -> Option<&str> {
        self.get(keys::SOUND_MODE).and_then(Value::as_str)
    }

    pub fn sound_mode_list(&self) -> Vec<&str> {
        string_list(self.get(keys::SOUND_MODE_LIST))
    }
}

fn string_list(value: Option<&Value>) -> Vec<&str> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
