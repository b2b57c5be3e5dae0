//! Local mirror of the receiver's state object ("MSO").
//!
//! The receiver sends the whole document once per session and then only
//! JSON-patch deltas, so the client has to keep its own copy to resolve
//! paths like `/inputs/h1/label` after a partial update.

use serde_json::{Map, Value};

use crate::protocol::PatchOp;

/// Mirror of the most recent full state object plus applied deltas.
#[derive(Debug, Default, Clone)]
pub struct MsoMirror {
    doc: Option<Value>,
}

impl MsoMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the mirror with a freshly received full document.
    pub fn reset(&mut self, doc: Value) {
        self.doc = Some(doc);
    }

    /// Forget everything; deltas are ignored until the next [`reset`](Self::reset).
    pub fn clear(&mut self) {
        self.doc = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.doc.is_some()
    }

    pub fn document(&self) -> Option<&Value> {
        self.doc.as_ref()
    }

    /// Apply patch operations in order.
    ///
    /// Returns the number of operations that took effect. Operations whose
    /// target cannot be resolved are skipped with a debug log; a delta
    /// that arrives before the first full document is dropped entirely.
    pub fn apply(&mut self, ops: &[PatchOp]) -> usize {
        let Some(doc) = self.doc.as_mut() else {
            tracing::debug!(ops = ops.len(), "msoupdate before mso, ignoring");
            return 0;
        };

        let mut applied = 0;
        for op in ops {
            if apply_op(doc, op) {
                applied += 1;
            } else {
                tracing::debug!(op = %op.op, path = %op.path, "patch op not applied");
            }
        }
        applied
    }
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> bool {
    match op.op.as_str() {
        "replace" | "add" => {
            let Some(value) = op.value.clone() else {
                return false;
            };
            set_pointer(doc, &op.path, value)
        }
        "remove" => remove_pointer(doc, &op.path),
        _ => false,
    }
}

/// Split a JSON pointer into its parent pointer and unescaped last token.
fn split_pointer(path: &str) -> Option<(&str, String)> {
    let idx = path.rfind('/')?;
    let (parent, last) = path.split_at(idx);
    let token = last[1..].replace("~1", "/").replace("~0", "~");
    Some((parent, token))
}

fn set_pointer(doc: &mut Value, path: &str, value: Value) -> bool {
    if path.is_empty() {
        *doc = value;
        return true;
    }
    let Some((parent, token)) = split_pointer(path) else {
        return false;
    };

    match doc.pointer_mut(parent) {
        Some(Value::Object(map)) => {
            map.insert(token, value);
            true
        }
        Some(Value::Array(items)) => {
            if token == "-" {
                items.push(value);
                return true;
            }
            match token.parse::<usize>() {
                Ok(i) if i < items.len() => {
                    items[i] = value;
                    true
                }
                Ok(i) if i == items.len() => {
                    items.push(value);
                    true
                }
                _ => false,
            }
        }
        Some(slot) if slot.is_null() => {
            let mut map = Map::new();
            map.insert(token, value);
            *slot = Value::Object(map);
            true
        }
        _ => false,
    }
}

fn remove_pointer(doc: &mut Value, path: &str) -> bool {
    let Some((parent, token)) = split_pointer(path) else {
        return false;
    };
    match doc.pointer_mut(parent) {
        Some(Value::Object(map)) => map.remove(&token).is_some(),
        Some(Value::Array(items)) => match token.parse::<usize>() {
            Ok(i) if i < items.len() => {
                items.remove(i);
                true
            }
            _ => false,
        },
        _ => false,
    }
}
