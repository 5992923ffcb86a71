//! Protocol command identifiers and the value types carried in payloads.
//!
//! Unknown identifiers and discriminants decode to `PbauError::UnknownVariant`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PbauError;

// ── Command ──────────────────────────────────────────────────────

/// Command identifiers understood by the PBAU automation server.
///
/// Replies carry the identifier of the request they answer, except
/// failures which carry [`Command::Error`].
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // ── Transport / cues ─────────────────────────────────────────
    /// Set a sequence's transport mode (play / stop / pause).
    SetSequenceTransportMode = 9,
    /// Move a sequence's playhead to a cue.
    MoveSequenceToCue = 10,
    /// Jump to the next or previous cue of a sequence.
    MoveSequenceToNextLastCue = 11,
    /// Toggle whether the next cue of a sequence is ignored.
    IgnoreNextCue = 12,
    /// Make a sequence the selected one.
    SelectSequence = 13,

    // ── Project / views ──────────────────────────────────────────
    /// Apply a stored view.
    ApplyView = 20,
    /// Save the open project.
    SaveProject = 21,
    /// Toggle fullscreen output on a site.
    ToggleFullscreen = 22,
    /// Change a site's IP address.
    SetSiteIp = 23,

    // ── Programmer ───────────────────────────────────────────────
    /// Clear all active values in the programmer.
    ClearAllActive = 30,
    /// Store active values into a sequence at the playhead.
    StoreActive = 31,
    /// Store active values into a sequence at its start.
    StoreActiveToBeginning = 32,
    /// Reset every parameter to its default.
    ResetAll = 33,
    /// Configure a sequence's SMPTE timecode mode.
    SetSequenceSmpteMode = 34,

    // ── Queries ──────────────────────────────────────────────────
    /// Query a sequence's transport mode.
    GetSequenceTransportMode = 65,
    /// Query a sequence's running time.
    GetSequenceTime = 72,
    /// Query the remaining time until a sequence's next cue.
    GetRemainingTimeUntilNextCue = 73,
    /// Enumerate sequence IDs.
    GetSequenceIds = 87,
    /// Resolve a sequence's name.
    GetSequenceName = 88,

    /// Server-side failure reply.
    Error = 0xFFFF,
}

impl Command {
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Whether the server answers this command with a reply frame.
    pub fn expects_response(&self) -> bool {
        matches!(
            self,
            Command::GetSequenceTransportMode
                | Command::GetSequenceTime
                | Command::GetRemainingTimeUntilNextCue
                | Command::GetSequenceIds
                | Command::GetSequenceName
        )
    }
}

impl TryFrom<u16> for Command {
    type Error = PbauError;

    fn try_from(value: u16) -> Result<Self, PbauError> {
        match value {
            9 => Ok(Command::SetSequenceTransportMode),
            10 => Ok(Command::MoveSequenceToCue),
            11 => Ok(Command::MoveSequenceToNextLastCue),
            12 => Ok(Command::IgnoreNextCue),
            13 => Ok(Command::SelectSequence),

            20 => Ok(Command::ApplyView),
            21 => Ok(Command::SaveProject),
            22 => Ok(Command::ToggleFullscreen),
            23 => Ok(Command::SetSiteIp),

            30 => Ok(Command::ClearAllActive),
            31 => Ok(Command::StoreActive),
            32 => Ok(Command::StoreActiveToBeginning),
            33 => Ok(Command::ResetAll),
            34 => Ok(Command::SetSequenceSmpteMode),

            65 => Ok(Command::GetSequenceTransportMode),
            72 => Ok(Command::GetSequenceTime),
            73 => Ok(Command::GetRemainingTimeUntilNextCue),
            87 => Ok(Command::GetSequenceIds),
            88 => Ok(Command::GetSequenceName),

            0xFFFF => Ok(Command::Error),

            _ => Err(PbauError::UnknownVariant {
                type_name: "Command",
                value: value as i64,
            }),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ── TransportState ───────────────────────────────────────────────

/// Playback state of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransportState {
    Play,
    Pause,
    Stop,
    #[default]
    Unknown,
}

impl TransportState {
    /// Interpret the wire value of a transport-mode reply.
    ///
    /// Anything outside 1..=3 reads as `Unknown`.
    pub fn from_wire(value: i32) -> Self {
        match value {
            1 => TransportState::Play,
            2 => TransportState::Stop,
            3 => TransportState::Pause,
            _ => TransportState::Unknown,
        }
    }

    /// Wire value used when setting the transport mode.
    ///
    /// `Unknown` has no wire form.
    pub fn to_wire(self) -> Option<i32> {
        match self {
            TransportState::Play => Some(1),
            TransportState::Stop => Some(2),
            TransportState::Pause => Some(3),
            TransportState::Unknown => None,
        }
    }

    /// Fold per-sequence states into one: any Play wins, then Pause,
    /// then Stop.
    pub fn aggregate<I>(states: I) -> Self
    where
        I: IntoIterator<Item = TransportState>,
    {
        let mut result = TransportState::Unknown;
        for state in states {
            result = match (result, state) {
                (TransportState::Play, _) | (_, TransportState::Play) => TransportState::Play,
                (TransportState::Pause, _) | (_, TransportState::Pause) => TransportState::Pause,
                (TransportState::Stop, _) | (_, TransportState::Stop) => TransportState::Stop,
                _ => TransportState::Unknown,
            };
        }
        result
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Play => write!(f, "Play"),
            TransportState::Pause => write!(f, "Pause"),
            TransportState::Stop => write!(f, "Stop"),
            TransportState::Unknown => write!(f, "Unknown"),
        }
    }
}

impl std::str::FromStr for TransportState {
    type Err = PbauError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "play" => Ok(TransportState::Play),
            "pause" => Ok(TransportState::Pause),
            "stop" => Ok(TransportState::Stop),
            other => Err(PbauError::Other(format!("unknown transport mode '{other}'"))),
        }
    }
}

// ── SmpteMode ────────────────────────────────────────────────────

/// Per-sequence SMPTE timecode configuration.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmpteMode {
    None = 0,
    Send = 1,
    Receive = 2,
}

impl TryFrom<i32> for SmpteMode {
    type Error = PbauError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SmpteMode::None),
            1 => Ok(SmpteMode::Send),
            2 => Ok(SmpteMode::Receive),
            _ => Err(PbauError::UnknownVariant {
                type_name: "SmpteMode",
                value: value as i64,
            }),
        }
    }
}

// ── Timecode ─────────────────────────────────────────────────────

/// A sequence time as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timecode {
    pub hours: i32,
    pub minutes: i32,
    pub seconds: i32,
    pub frames: i32,
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

// ── SequenceInfo ─────────────────────────────────────────────────

/// One entry of a completed discovery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceInfo {
    pub id: i32,
    pub name: String,
}

impl SequenceInfo {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Label used when a name never resolved.
    pub fn placeholder(id: i32) -> Self {
        Self::new(id, format!("Sequence {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_roundtrip() {
        let cmds = [
            Command::SetSequenceTransportMode,
            Command::MoveSequenceToCue,
            Command::MoveSequenceToNextLastCue,
            Command::IgnoreNextCue,
            Command::SelectSequence,
            Command::ApplyView,
            Command::SaveProject,
            Command::ToggleFullscreen,
            Command::SetSiteIp,
            Command::ClearAllActive,
            Command::StoreActive,
            Command::StoreActiveToBeginning,
            Command::ResetAll,
            Command::SetSequenceSmpteMode,
            Command::GetSequenceTransportMode,
            Command::GetSequenceTime,
            Command::GetRemainingTimeUntilNextCue,
            Command::GetSequenceIds,
            Command::GetSequenceName,
            Command::Error,
        ];
        for cmd in cmds {
            assert_eq!(Command::try_from(cmd.id()).unwrap(), cmd);
        }
    }

    #[test]
    fn command_invalid() {
        assert!(Command::try_from(0xDEAD).is_err());
    }

    #[test]
    fn error_sentinel_is_minus_one_signed() {
        assert_eq!(Command::Error.id() as i16, -1);
    }

    #[test]
    fn queries_expect_responses() {
        assert!(Command::GetSequenceName.expects_response());
        assert!(!Command::SaveProject.expects_response());
    }

    #[test]
    fn transport_wire_mapping() {
        assert_eq!(TransportState::from_wire(1), TransportState::Play);
        assert_eq!(TransportState::from_wire(2), TransportState::Stop);
        assert_eq!(TransportState::from_wire(3), TransportState::Pause);
        assert_eq!(TransportState::from_wire(0), TransportState::Unknown);
        assert_eq!(TransportState::from_wire(-4), TransportState::Unknown);
        assert_eq!(TransportState::Pause.to_wire(), Some(3));
        assert_eq!(TransportState::Unknown.to_wire(), None);
    }

    #[test]
    fn aggregate_prefers_play_then_pause() {
        use TransportState::*;
        assert_eq!(TransportState::aggregate([Stop, Play, Pause]), Play);
        assert_eq!(TransportState::aggregate([Stop, Pause]), Pause);
        assert_eq!(TransportState::aggregate([Unknown, Stop]), Stop);
        assert_eq!(TransportState::aggregate(Vec::new()), Unknown);
    }

    #[test]
    fn transport_parses_case_insensitively() {
        assert_eq!("PLAY".parse::<TransportState>().unwrap(), TransportState::Play);
        assert!("rewind".parse::<TransportState>().is_err());
    }

    #[test]
    fn transport_serializes_by_name() {
        let json = serde_json::to_string(&TransportState::Pause).unwrap();
        assert_eq!(json, "\"Pause\"");
    }

    #[test]
    fn timecode_display() {
        let tc = Timecode {
            hours: 1,
            minutes: 2,
            seconds: 3,
            frames: 24,
        };
        assert_eq!(tc.to_string(), "01:02:03:24");
    }

    #[test]
    fn placeholder_label() {
        assert_eq!(SequenceInfo::placeholder(7).name, "Sequence 7");
    }
}
