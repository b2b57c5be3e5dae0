// ── MSO → flat state projection ──
//
// Maps the receiver's nested state object onto the flat keys in
// `state::keys`. A full document produces every key it can; a delta only
// re-derives the keys whose source paths were touched, so the store can
// diff a small frame instead of the whole snapshot.

use std::collections::{HashMap, HashSet};

use htp1_api::PatchOp;
use serde_json::{Map, Value};
use strum::IntoEnumIterator;

use super::sound_mode::{self, SoundMode};
use super::state::{Frame, keys};

/// Volume range assumed when the document has no calibration block.
pub const DEFAULT_MIN_DB: f64 = -80.0;
pub const DEFAULT_MAX_DB: f64 = 0.0;

#[derive(Debug, Default, Clone, Copy)]
struct Sections {
    power: bool,
    volume: bool,
    muted: bool,
    inputs: bool,
    source: bool,
    upmix_list: bool,
    sound_mode: bool,
}

impl Sections {
    fn all() -> Self {
        Self {
            power: true,
            volume: true,
            muted: true,
            inputs: true,
            source: true,
            upmix_list: true,
            sound_mode: true,
        }
    }

    fn touch(&mut self, path: &str) {
        match path {
            "" => *self = Self::all(),
            "/powerIsOn" => self.power = true,
            "/volume" | "/cal" | "/cal/vpl" | "/cal/vph" => self.volume = true,
            "/muted" => self.muted = true,
            "/input" => self.source = true,
            "/inputs" => {
                self.inputs = true;
                self.source = true;
            }
            "/upmix/select" => self.sound_mode = true,
            "/upmix" => {
                self.upmix_list = true;
                self.sound_mode = true;
            }
            p if p.starts_with("/inputs/") => {
                self.inputs = true;
                self.source = true;
            }
            p if p.starts_with("/upmix/") => self.upmix_list = true,
            _ => {}
        }
    }
}

/// Project a complete MSO document.
pub fn project_full(doc: &Value) -> Frame {
    project(doc, Sections::all())
}

/// Project only the keys affected by `ops`, reading values from the
/// already-patched document.
pub fn project_partial(doc: &Value, ops: &[PatchOp]) -> Frame {
    let mut sections = Sections::default();
    for op in ops {
        sections.touch(&op.path);
    }
    project(doc, sections)
}

fn project(doc: &Value, sections: Sections) -> Frame {
    let mut frame = Frame::new();

    if sections.power {
        if let Some(on) = doc.get("powerIsOn").and_then(Value::as_bool) {
            frame.insert(keys::POWER.into(), Value::Bool(on));
        }
    }
    if sections.volume {
        project_volume(doc, &mut frame);
    }
    if sections.muted {
        if let Some(muted) = doc.get("muted").and_then(Value::as_bool) {
            frame.insert(keys::MUTED.into(), Value::Bool(muted));
        }
    }
    if sections.inputs {
        project_inputs(doc, &mut frame);
    }
    if sections.source {
        if let Some(label) = active_source_label(doc) {
            frame.insert(keys::SOURCE.into(), Value::String(label));
        }
    }
    if sections.upmix_list {
        let modes: Vec<Value> = offered_sound_modes(doc)
            .into_iter()
            .map(Value::from)
            .collect();
        frame.insert(keys::SOUND_MODE_LIST.into(), Value::Array(modes));
    }
    if sections.sound_mode {
        if let Some(code) = doc.pointer("/upmix/select").and_then(Value::as_str) {
            let name = sound_mode::display_name_for_code(code);
            frame.insert(keys::SOUND_MODE.into(), Value::from(name));
        }
    }

    frame
}

fn project_volume(doc: &Value, frame: &mut Frame) {
    if doc.get("volume").is_none() && doc.get("cal").is_none() {
        return;
    }
    let min = doc
        .pointer("/cal/vpl")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_MIN_DB);
    let max = doc
        .pointer("/cal/vph")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_MAX_DB);

    frame.insert(keys::VOLUME_MIN_DB.into(), Value::from(min));
    frame.insert(keys::VOLUME_MAX_DB.into(), Value::from(max));

    let Some(db) = doc.get("volume").and_then(Value::as_f64) else {
        return;
    };
    frame.insert(keys::VOLUME_DB.into(), Value::from(db));

    if max > min {
        let level = ((db - min) / (max - min)).clamp(0.0, 1.0);
        frame.insert(keys::VOLUME.into(), Value::from(level));
    } else {
        tracing::warn!(min, max, "invalid volume calibration range");
    }
}

/// Visible inputs in document order, with their list labels.
///
/// A label shared by several visible inputs is suffixed with the input
/// code so every entry selects exactly one input.
fn visible_inputs(doc: &Value) -> Vec<(&str, String)> {
    let inputs: Vec<(&str, String)> = doc
        .get("inputs")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|inputs| inputs.iter())
        .filter(|(_, input)| {
            input
                .get("visible")
                .and_then(Value::as_bool)
                .unwrap_or(true)
        })
        .map(|(code, input)| (code.as_str(), input_label(code, input)))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, label) in &inputs {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    let shared: HashSet<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(label, _)| label.to_owned())
        .collect();

    inputs
        .into_iter()
        .map(|(code, label)| {
            if shared.contains(&label) {
                (code, format!("{label} ({code})"))
            } else {
                (code, label)
            }
        })
        .collect()
}

fn input_label(code: &str, input: &Value) -> String {
    input
        .get("label")
        .and_then(Value::as_str)
        .filter(|label| !label.is_empty())
        .unwrap_or(code)
        .to_owned()
}

fn project_inputs(doc: &Value, frame: &mut Frame) {
    let mut labels = Vec::new();
    let mut codes = Map::new();
    for (code, label) in visible_inputs(doc) {
        codes.insert(label.clone(), Value::from(code));
        labels.push(Value::String(label));
    }
    frame.insert(keys::SOURCE_LIST.into(), Value::Array(labels));
    frame.insert(keys::SOURCE_CODES.into(), Value::Object(codes));
}

fn active_source_label(doc: &Value) -> Option<String> {
    let code = doc.get("input").and_then(Value::as_str)?;
    if let Some((_, label)) = visible_inputs(doc).into_iter().find(|(c, _)| *c == code) {
        return Some(label);
    }
    let label = doc
        .get("inputs")
        .and_then(|inputs| inputs.get(code))
        .map_or_else(|| code.to_owned(), |input| input_label(code, input));
    Some(label)
}

/// Modes the receiver offers on its home screen (`homevis`): known modes
/// in table order, then codes this build does not know, by raw code.
fn offered_sound_modes(doc: &Value) -> Vec<&str> {
    let Some(upmix) = doc.get("upmix").and_then(Value::as_object) else {
        return Vec::new();
    };
    let offered = |code: &str| {
        upmix
            .get(code)
            .and_then(|entry| entry.get("homevis"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };

    let known = SoundMode::iter()
        .filter(|mode| offered(mode.code()))
        .map(|mode| -> &str { mode.display_name() });
    let unknown = upmix
        .keys()
        .map(String::as_str)
        .filter(|code| SoundMode::from_code(*code).is_none() && offered(*code))
        .map(sound_mode::display_name_for_code);
    known.chain(unknown).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "powerIsOn": true,
            "volume": -64,
            "muted": false,
            "cal": { "vpl": -80, "vph": 0 },
            "input": "h1",
            "inputs": {
                "h1": { "label": "Apple TV", "visible": true },
                "h2": { "label": "", "visible": true },
                "spdif": { "label": "CD", "visible": false }
            },
            "upmix": {
                "select": "dolby",
                "dolby": { "homevis": true },
                "dts": { "homevis": true },
                "auro": { "homevis": false },
                "off": { "homevis": true }
            }
        })
    }

    #[test]
    fn full_projection() {
        let frame = project_full(&document());

        assert_eq!(frame[keys::POWER], json!(true));
        assert_eq!(frame[keys::VOLUME_DB], json!(-64.0));
        assert_eq!(frame[keys::VOLUME], json!(0.2));
        assert_eq!(frame[keys::MUTED], json!(false));
        assert_eq!(frame[keys::SOURCE], json!("Apple TV"));
        assert_eq!(frame[keys::SOURCE_LIST], json!(["Apple TV", "h2"]));
        assert_eq!(
            frame[keys::SOURCE_CODES],
            json!({ "Apple TV": "h1", "h2": "h2" })
        );
        assert_eq!(frame[keys::SOUND_MODE], json!("DOLBY SURROUND"));
        assert_eq!(
            frame[keys::SOUND_MODE_LIST],
            json!(["DIRECT", "DOLBY SURROUND", "DTS NEURAL:X"])
        );
    }

    #[test]
    fn partial_projection_only_touches_affected_keys() {
        let doc = document();
        let frame = project_partial(&doc, &[PatchOp::replace("/muted", true)]);
        let touched: Vec<_> = frame.keys().map(String::as_str).collect();
        assert_eq!(touched, vec![keys::MUTED]);

        let frame = project_partial(&doc, &[PatchOp::replace("/inputs/h1/label", "TV")]);
        let touched: Vec<_> = frame.keys().map(String::as_str).collect();
        assert_eq!(
            touched,
            vec![keys::SOURCE, keys::SOURCE_CODES, keys::SOURCE_LIST]
        );
    }

    #[test]
    fn calibration_change_renormalizes_volume() {
        let mut doc = document();
        doc["cal"]["vph"] = json!(-40);
        let frame = project_partial(&doc, &[PatchOp::replace("/cal/vph", -40)]);
        assert_eq!(frame[keys::VOLUME_MAX_DB], json!(-40.0));
        assert_eq!(frame[keys::VOLUME], json!(0.4));
    }

    #[test]
    fn missing_calibration_uses_default_range() {
        let frame = project_full(&json!({ "volume": -40 }));
        assert_eq!(frame[keys::VOLUME_MIN_DB], json!(-80.0));
        assert_eq!(frame[keys::VOLUME_MAX_DB], json!(0.0));
        assert_eq!(frame[keys::VOLUME], json!(0.5));
    }

    #[test]
    fn unknown_upmix_code_passes_through() {
        let frame = project_full(&json!({ "upmix": { "select": "mono" } }));
        assert_eq!(frame[keys::SOUND_MODE], json!("mono"));
        assert_eq!(frame[keys::SOUND_MODE_LIST], json!([]));
    }

    #[test]
    fn unknown_offered_mode_is_listed_by_code() {
        let frame = project_full(&json!({
            "upmix": {
                "select": "mono",
                "mono": { "homevis": true },
                "dolby": { "homevis": true }
            }
        }));
        assert_eq!(frame[keys::SOUND_MODE], json!("mono"));
        assert_eq!(frame[keys::SOUND_MODE_LIST], json!(["DOLBY SURROUND", "mono"]));
    }

    #[test]
    fn shared_input_labels_are_suffixed_with_code() {
        let frame = project_full(&json!({
            "input": "h2",
            "inputs": {
                "h1": { "label": "Game", "visible": true },
                "h2": { "label": "Game", "visible": true },
                "h3": { "label": "Game", "visible": false },
                "usb": { "label": "Streamer", "visible": true }
            }
        }));
        assert_eq!(
            frame[keys::SOURCE_LIST],
            json!(["Game (h1)", "Game (h2)", "Streamer"])
        );
        assert_eq!(
            frame[keys::SOURCE_CODES],
            json!({ "Game (h1)": "h1", "Game (h2)": "h2", "Streamer": "usb" })
        );
        assert_eq!(frame[keys::SOURCE], json!("Game (h2)"));
    }

    #[test]
    fn unrelated_paths_project_nothing() {
        let frame = project_partial(&document(), &[PatchOp::replace("/dsp/cpu", 12)]);
        assert!(frame.is_empty());
    }
}
