//! Outbound requests and their payload layouts.
//!
//! ```text
//! SetSequenceTransportMode   seq:i32  mode:i32
//! SelectSequence             seq:i32
//! MoveSequenceToCue          seq:i32  cue:i32
//! MoveSequenceToNextLastCue  seq:i32  next:bool
//! IgnoreNextCue              seq:i32  ignore:bool
//! ApplyView                  view:i32
//! SaveProject                -
//! ToggleFullscreen           site:i32
//! SetSiteIp                  site:i32 ip:string
//! ClearAllActive             -
//! StoreActive                seq:i32
//! StoreActiveToBeginning     seq:i32
//! ResetAll                   -
//! SetSequenceSmpteMode       seq:i32  mode:i32  stopped:bool
//! GetSequenceTransportMode   seq:i32
//! GetSequenceTime            seq:i32
//! GetRemainingTimeUntilNextCue seq:i32
//! GetSequenceIds             -
//! GetSequenceName            seq:i32
//! ```

use crate::error::PbauError;
use crate::message::{Command, SmpteMode, TransportState};
use crate::packet::Frame;
use crate::payload::PayloadWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    SetTransport { sequence: i32, state: TransportState },
    SelectSequence { sequence: i32 },
    GotoCue { sequence: i32, cue: i32 },
    NextOrLastCue { sequence: i32, next: bool },
    IgnoreNextCue { sequence: i32, ignore: bool },
    ApplyView { view: i32 },
    SaveProject,
    ToggleFullscreen { site: i32 },
    SetSiteIp { site: i32, ip: String },
    ClearAllActive,
    StoreActive { sequence: i32 },
    StoreActiveToBeginning { sequence: i32 },
    ResetAll,
    SetSequenceSmpteMode {
        sequence: i32,
        mode: SmpteMode,
        stopped: bool,
    },
    GetTransportMode { sequence: i32 },
    GetSequenceTime { sequence: i32 },
    GetRemainingTime { sequence: i32 },
    GetSequenceIds,
    GetSequenceName { sequence: i32 },
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::SetTransport { .. } => Command::SetSequenceTransportMode,
            Request::SelectSequence { .. } => Command::SelectSequence,
            Request::GotoCue { .. } => Command::MoveSequenceToCue,
            Request::NextOrLastCue { .. } => Command::MoveSequenceToNextLastCue,
            Request::IgnoreNextCue { .. } => Command::IgnoreNextCue,
            Request::ApplyView { .. } => Command::ApplyView,
            Request::SaveProject => Command::SaveProject,
            Request::ToggleFullscreen { .. } => Command::ToggleFullscreen,
            Request::SetSiteIp { .. } => Command::SetSiteIp,
            Request::ClearAllActive => Command::ClearAllActive,
            Request::StoreActive { .. } => Command::StoreActive,
            Request::StoreActiveToBeginning { .. } => Command::StoreActiveToBeginning,
            Request::ResetAll => Command::ResetAll,
            Request::SetSequenceSmpteMode { .. } => Command::SetSequenceSmpteMode,
            Request::GetTransportMode { .. } => Command::GetSequenceTransportMode,
            Request::GetSequenceTime { .. } => Command::GetSequenceTime,
            Request::GetRemainingTime { .. } => Command::GetRemainingTimeUntilNextCue,
            Request::GetSequenceIds => Command::GetSequenceIds,
            Request::GetSequenceName { .. } => Command::GetSequenceName,
        }
    }

    pub fn to_frame(&self, domain: i32) -> Result<Frame, PbauError> {
        let w = PayloadWriter::new();
        let w = match self {
            Request::SetTransport { sequence, state } => {
                let mode = state
                    .to_wire()
                    .ok_or(PbauError::Other("cannot set transport to Unknown".into()))?;
                w.int(*sequence).int(mode)
            }
            Request::SelectSequence { sequence }
            | Request::StoreActive { sequence }
            | Request::StoreActiveToBeginning { sequence }
            | Request::GetTransportMode { sequence }
            | Request::GetSequenceTime { sequence }
            | Request::GetRemainingTime { sequence }
            | Request::GetSequenceName { sequence } => w.int(*sequence),
            Request::GotoCue { sequence, cue } => w.int(*sequence).int(*cue),
            Request::NextOrLastCue { sequence, next } => w.int(*sequence).boolean(*next),
            Request::IgnoreNextCue { sequence, ignore } => w.int(*sequence).boolean(*ignore),
            Request::ApplyView { view } => w.int(*view),
            Request::ToggleFullscreen { site } => w.int(*site),
            Request::SetSiteIp { site, ip } => w.int(*site).string(ip),
            Request::SetSequenceSmpteMode {
                sequence,
                mode,
                stopped,
            } => w.int(*sequence).int(*mode as i32).boolean(*stopped),
            Request::SaveProject
            | Request::ClearAllActive
            | Request::ResetAll
            | Request::GetSequenceIds => w,
        };
        Frame::new(domain, self.command(), w.finish())
    }
}
