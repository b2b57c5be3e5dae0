//! Wire messages exchanged with the HTP-1 controller endpoint.
//!
//! Every frame is a text message of the form `verb payload`, where the
//! payload (if any) is JSON. The receiver pushes its full state object
//! (`mso`) on request and JSON-patch deltas (`msoupdate`) whenever
//! something changes; the client writes deltas back with `changemso`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

// ── Verbs ────────────────────────────────────────────────────────────

const VERB_GET_MSO: &str = "getmso";
const VERB_MSO: &str = "mso";
const VERB_MSO_UPDATE: &str = "msoupdate";
const VERB_CHANGE_MSO: &str = "changemso";
const VERB_AVCUI: &str = "avcui";

// ── PatchOp ──────────────────────────────────────────────────────────

/// One JSON-patch operation against the receiver's state object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    /// `"replace"`, `"add"` or `"remove"`.
    pub op: String,

    /// JSON pointer into the state object, e.g. `"/volume"`.
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOp {
    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: "replace".into(),
            path: path.into(),
            value: Some(value.into()),
        }
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// A request written to the receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Ask for the full state object; answered by an `mso` frame.
    GetMso,
    /// Apply patch operations to the state object.
    ChangeMso(Vec<PatchOp>),
    /// Front-panel / on-screen menu key, e.g. `"up"` or `"home"`.
    Avcui(String),
}

impl Request {
    /// Render the request as a single text frame.
    pub fn encode(&self) -> String {
        match self {
            Self::GetMso => VERB_GET_MSO.to_owned(),
            Self::ChangeMso(ops) => {
                format!("{VERB_CHANGE_MSO} {}", Value::from(ops_to_values(ops)))
            }
            Self::Avcui(key) => format!("{VERB_AVCUI} {}", Value::from(key.as_str())),
        }
    }
}

fn ops_to_values(ops: &[PatchOp]) -> Vec<Value> {
    ops.iter()
        .map(|op| serde_json::to_value(op).unwrap_or(Value::Null))
        .collect()
}

// ── Inbound ──────────────────────────────────────────────────────────

/// A decoded frame pushed by the receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The complete state object.
    Mso(Value),
    /// Incremental changes to the state object.
    MsoUpdate(Vec<PatchOp>),
    /// Any verb this client does not act on.
    Other { verb: String },
}

impl Inbound {
    /// Parse a text frame.
    pub fn parse(frame: &str) -> Result<Self, Error> {
        let trimmed = frame.trim();
        if trimmed.is_empty() {
            return Err(protocol_error("empty frame", frame));
        }

        let (verb, payload) = trimmed
            .split_once(char::is_whitespace)
            .map_or((trimmed, ""), |(v, p)| (v, p.trim_start()));

        match verb {
            VERB_MSO => {
                let doc: Value = serde_json::from_str(payload)
                    .map_err(|e| protocol_error(&format!("invalid mso payload: {e}"), frame))?;
                if !doc.is_object() {
                    return Err(protocol_error("mso payload is not an object", frame));
                }
                Ok(Self::Mso(doc))
            }
            VERB_MSO_UPDATE => {
                let raw: Value = serde_json::from_str(payload).map_err(|e| {
                    protocol_error(&format!("invalid msoupdate payload: {e}"), frame)
                })?;
                let ops = match raw {
                    Value::Array(_) => serde_json::from_value::<Vec<PatchOp>>(raw),
                    other => serde_json::from_value::<PatchOp>(other).map(|op| vec![op]),
                }
                .map_err(|e| protocol_error(&format!("invalid patch op: {e}"), frame))?;
                Ok(Self::MsoUpdate(ops))
            }
            other => Ok(Self::Other {
                verb: other.to_owned(),
            }),
        }
    }
}

fn protocol_error(message: &str, frame: &str) -> Error {
    Error::Protocol {
        message: message.to_owned(),
        frame: frame.to_owned(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
