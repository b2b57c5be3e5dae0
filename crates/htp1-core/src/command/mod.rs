// ── Command encoding ──
//
// Every write flows through `Action`. Encoding is pure: it reads the
// current snapshot, validates, and yields the wire requests to queue.
// Any failure is returned before the transport is touched.

mod menu;

use htp1_api::{PatchOp, Request};
use strum::IntoStaticStr;

use crate::error::CoreError;
use crate::store::projection::{DEFAULT_MAX_DB, DEFAULT_MIN_DB};
use crate::store::sound_mode;
use crate::store::{DeviceState, keys};

pub use menu::MenuCommand;

/// A high-level intent for the receiver.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    TurnOn,
    TurnOff,
    PowerToggle,
    /// Normalized level in `[0.0, 1.0]`.
    SetVolume(f64),
    VolumeUp,
    VolumeDown,
    Mute(bool),
    MuteToggle,
    /// Display label from the advertised source list.
    SelectSource(String),
    /// Display name from the advertised sound-mode list.
    SelectSoundMode(String),
    Menu(MenuCommand),
}

impl Action {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// What the encoder may consult.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub state: &'a DeviceState,
    /// State reflects a full document from the live session.
    pub synced: bool,
    pub volume_step_db: f64,
}

/// Translate `action` into wire requests.
pub fn encode(action: &Action, ctx: &EncodeContext<'_>) -> Result<Vec<Request>, CoreError> {
    let request = match action {
        Action::TurnOn => change("/powerIsOn", true),
        Action::TurnOff => change("/powerIsOn", false),
        Action::PowerToggle => {
            let on = fresh(ctx, keys::POWER, DeviceState::power)?;
            change("/powerIsOn", !on)
        }
        Action::SetVolume(level) => {
            let db = level_to_db(*level, volume_range(ctx.state))?;
            change("/volume", db)
        }
        Action::VolumeUp => step_volume(ctx, ctx.volume_step_db)?,
        Action::VolumeDown => step_volume(ctx, -ctx.volume_step_db)?,
        Action::Mute(muted) => change("/muted", *muted),
        Action::MuteToggle => {
            let muted = fresh(ctx, keys::MUTED, DeviceState::muted)?;
            change("/muted", !muted)
        }
        Action::SelectSource(label) => {
            let available = ctx.state.source_list();
            let code = available
                .contains(&label.as_str())
                .then(|| ctx.state.source_code(label))
                .flatten()
                .ok_or_else(|| unknown("source", label, &available))?;
            change("/input", code)
        }
        Action::SelectSoundMode(name) => {
            let available = ctx.state.sound_mode_list();
            if !available.contains(&name.as_str()) {
                return Err(unknown("sound mode", name, &available));
            }
            change("/upmix/select", sound_mode::code_for_display_name(name))
        }
        Action::Menu(command) => Request::Avcui(command.to_string()),
    };
    Ok(vec![request])
}

fn change(path: &str, value: impl Into<serde_json::Value>) -> Request {
    Request::ChangeMso(vec![PatchOp::replace(path, value)])
}

fn unknown(kind: &'static str, value: &str, available: &[&str]) -> CoreError {
    CoreError::UnknownOption {
        kind,
        value: value.to_owned(),
        available: available.iter().map(|s| (*s).to_owned()).collect(),
    }
}

/// Read a value that a toggle or relative step depends on.
fn fresh<T>(
    ctx: &EncodeContext<'_>,
    key: &'static str,
    read: impl Fn(&DeviceState) -> Option<T>,
) -> Result<T, CoreError> {
    if !ctx.synced {
        return Err(CoreError::StateUnavailable { key });
    }
    read(ctx.state).ok_or(CoreError::StateUnavailable { key })
}

fn volume_range(state: &DeviceState) -> (f64, f64) {
    state
        .volume_range_db()
        .filter(|(min, max)| max > min)
        .unwrap_or((DEFAULT_MIN_DB, DEFAULT_MAX_DB))
}

/// Map a normalized level onto the calibrated dB range.
fn level_to_db(level: f64, (min, max): (f64, f64)) -> Result<i64, CoreError> {
    if !level.is_finite() || !(0.0..=1.0).contains(&level) {
        return Err(CoreError::InvalidArgument {
            message: format!("volume level {level} is outside 0.0..=1.0"),
        });
    }
    Ok(whole_db(min + level * (max - min)))
}

fn step_volume(ctx: &EncodeContext<'_>, step_db: f64) -> Result<Request, CoreError> {
    let current = fresh(ctx, keys::VOLUME_DB, DeviceState::volume_db)?;
    let (min, max) = volume_range(ctx.state);
    Ok(change("/volume", whole_db((current + step_db).clamp(min, max))))
}

/// Round to the receiver's whole-dB resolution.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn whole_db(db: f64) -> i64 {
    // Callers pass values bounded by the calibration range.
    db.round() as i64
}
