//! The VFD data model: drive identity, drive family, and the state mirror.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

/// A drive's commanded or reported direction/run state.
///
/// Numeric codes are part of the external interface and MUST NOT change:
/// `STOP=0`, `FORWARD=1`, `REVERSE=2`, `OFFLINE=254`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveMode {
    /// Drive is commanded/reporting stopped.
    #[default]
    Stop,
    /// Drive is commanded/reporting forward rotation.
    Forward,
    /// Drive is commanded/reporting reverse rotation.
    Reverse,
    /// No fresh data; the drive is presumed unreachable (mirror-only, never
    /// a valid command input).
    Offline,
}

impl DriveMode {
    /// The stable wire code for this mode.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            DriveMode::Stop => 0,
            DriveMode::Forward => 1,
            DriveMode::Reverse => 2,
            DriveMode::Offline => 254,
        }
    }

    /// Parse a wire code back into a mode. `None` for codes with no meaning.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DriveMode::Stop),
            1 => Some(DriveMode::Forward),
            2 => Some(DriveMode::Reverse),
            254 => Some(DriveMode::Offline),
            _ => None,
        }
    }

    /// The register value written to `S06` to command this mode. `None` for
    /// modes that are never valid commands (`OFFLINE`).
    #[must_use]
    pub fn to_command_word(self) -> Option<u16> {
        match self {
            DriveMode::Stop => Some(0),
            DriveMode::Forward => Some(1),
            DriveMode::Reverse => Some(2),
            DriveMode::Offline => None,
        }
    }

    /// Decode an operation command/status word into a mode, per §4.5.1: bit0
    /// set means FORWARD, else bit1 set means REVERSE, else STOP. This never
    /// produces `OFFLINE` — that is set only by poll-failure handling.
    #[must_use]
    pub fn decode_status_word(word: u16) -> Self {
        if word & 1 != 0 {
            DriveMode::Forward
        } else if word & 2 != 0 {
            DriveMode::Reverse
        } else {
            DriveMode::Stop
        }
    }
}

impl Serialize for DriveMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for DriveMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        DriveMode::from_code(code).ok_or_else(|| D::Error::custom(format!("invalid drive mode code {code}")))
    }
}

/// The supported drive families. Only `Frenic` has an implementation;
/// anything else is registered but non-operative (`UnsupportedModel`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VfdModel {
    /// Fuji Frenic-family function-code addressing.
    Frenic,
    /// Registered but not implemented.
    Unsupported(String),
}

impl VfdModel {
    /// Parse a configuration model tag.
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        if tag == "Frenic" {
            VfdModel::Frenic
        } else {
            VfdModel::Unsupported(tag.to_string())
        }
    }
}

impl std::fmt::Display for VfdModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VfdModel::Frenic => write!(f, "Frenic"),
            VfdModel::Unsupported(tag) => write!(f, "{tag}"),
        }
    }
}

/// Static, immutable-after-registration identity of a drive.
#[derive(Debug, Clone, Serialize)]
pub struct DriveDescriptor {
    /// Stable short id, unique within the process.
    pub id: String,
    /// Human-readable label.
    pub display_name: String,
    /// Modbus unit address on the shared bus, 1..=247.
    pub slave_id: u8,
    /// Drive family tag.
    #[serde(skip)]
    pub model: VfdModel,
}

/// Latest mirrored telemetry for a drive, maintained by the Poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveState {
    /// Reported frequency, Hz (0.01 precision).
    pub cur_frequency: f64,
    /// Commanded frequency, Hz (0.01 precision).
    pub tgt_frequency: f64,
    /// Reported run state.
    pub cur_drive_mode: DriveMode,
    /// Commanded run state.
    pub tgt_drive_mode: DriveMode,
    /// Output voltage, V (0.1 precision).
    pub output_voltage: f64,
    /// Output current, A (0.01 precision).
    pub output_current: f64,
    /// Input power, W (0.01 precision).
    pub input_power: f64,
    /// The drive's configured frequency ceiling, Hz.
    pub max_frequency: u32,
}

impl Default for DriveState {
    /// All-zero telemetry, both modes OFFLINE — the state a freshly
    /// registered, never-polled drive starts in.
    fn default() -> Self {
        Self {
            cur_frequency: 0.0,
            tgt_frequency: 0.0,
            cur_drive_mode: DriveMode::Offline,
            tgt_drive_mode: DriveMode::Offline,
            output_voltage: 0.0,
            output_current: 0.0,
            input_power: 0.0,
            max_frequency: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_mode_codes_are_stable() {
        assert_eq!(DriveMode::Stop.code(), 0);
        assert_eq!(DriveMode::Forward.code(), 1);
        assert_eq!(DriveMode::Reverse.code(), 2);
        assert_eq!(DriveMode::Offline.code(), 254);
    }

    #[test]
    fn offline_is_never_a_valid_command() {
        assert_eq!(DriveMode::Offline.to_command_word(), None);
        assert_eq!(DriveMode::Stop.to_command_word(), Some(0));
        assert_eq!(DriveMode::Forward.to_command_word(), Some(1));
        assert_eq!(DriveMode::Reverse.to_command_word(), Some(2));
    }

    #[test]
    fn status_word_decoder_matches_bit_rules() {
        assert_eq!(DriveMode::decode_status_word(0b01), DriveMode::Forward);
        assert_eq!(DriveMode::decode_status_word(0b10), DriveMode::Reverse);
        assert_eq!(DriveMode::decode_status_word(0b00), DriveMode::Stop);
        // bit0 takes precedence over bit1 when both are set.
        assert_eq!(DriveMode::decode_status_word(0b11), DriveMode::Forward);
    }

    #[test]
    fn default_state_is_zero_and_offline() {
        let state = DriveState::default();
        assert_eq!(state.cur_frequency, 0.0);
        assert_eq!(state.cur_drive_mode, DriveMode::Offline);
        assert_eq!(state.tgt_drive_mode, DriveMode::Offline);
    }
}
