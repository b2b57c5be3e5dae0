// ── Upmix (sound mode) translation ──
//
// The receiver reports upmix modes by short internal codes; users see
// the names printed on the front panel. The table is fixed by firmware.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

/// Upmix modes the HTP-1 offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundMode {
    Auro3d,
    Direct,
    DolbySurround,
    DtsNeuralX,
    Native,
    Stereo,
}

impl SoundMode {
    /// Code used in the MSO document under `/upmix`.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Auro3d => "auro",
            Self::Direct => "off",
            Self::DolbySurround => "dolby",
            Self::DtsNeuralX => "dts",
            Self::Native => "native",
            Self::Stereo => "stereo",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Auro3d => "AURO-3D",
            Self::Direct => "DIRECT",
            Self::DolbySurround => "DOLBY SURROUND",
            Self::DtsNeuralX => "DTS NEURAL:X",
            Self::Native => "NATIVE",
            Self::Stereo => "STEREO",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::iter().find(|mode| mode.code() == code)
    }

    pub fn from_display_name(name: &str) -> Option<Self> {
        Self::iter().find(|mode| mode.display_name() == name)
    }
}

/// Display name for a receiver code. Unknown codes come back unchanged.
pub fn display_name_for_code(code: &str) -> &str {
    if let Some(mode) = SoundMode::from_code(code) {
        mode.display_name()
    } else {
        tracing::warn!(code, "unknown sound mode code, passing through");
        code
    }
}

/// Receiver code for a display name. Unknown names come back unchanged.
pub fn code_for_display_name(name: &str) -> &str {
    if let Some(mode) = SoundMode::from_display_name(name) {
        mode.code()
    } else {
        tracing::warn!(name, "unknown sound mode name, passing through");
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_round_trips() {
        for mode in SoundMode::iter() {
            let name = display_name_for_code(mode.code());
            assert_eq!(name, mode.display_name());
            assert_eq!(code_for_display_name(name), mode.code());
        }
    }

    #[test]
    fn table_matches_front_panel_names() {
        assert_eq!(display_name_for_code("off"), "DIRECT");
        assert_eq!(display_name_for_code("dts"), "DTS NEURAL:X");
        assert_eq!(code_for_display_name("DOLBY SURROUND"), "dolby");
    }

    #[test]
    fn unknown_values_pass_through() {
        assert_eq!(display_name_for_code("mono"), "mono");
        assert_eq!(code_for_display_name("MONO"), "MONO");
        assert_eq!(SoundMode::from_code("mono"), None);
    }
}
