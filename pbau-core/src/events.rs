//! Consumer callbacks.
//!
//! Connections call into an [`EventHandler`] synchronously from their own
//! task. Handlers must therefore return quickly; anything slow belongs on
//! the other side of a channel (see the `UnboundedSender<Event>` impl).

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::PbauError;
use crate::message::{SequenceInfo, Timecode, TransportState};

/// Receives everything a connection learns. Every method defaults to a
/// no-op so consumers implement only what they render.
pub trait EventHandler: Send + Sync + 'static {
    /// Running time of a watched sequence.
    fn on_sequence_time(&self, _sequence: i32, _time: Timecode) {}

    /// Remaining time until the next cue of a watched sequence.
    fn on_next_cue_time(&self, _sequence: i32, _time: Timecode) {}

    /// Aggregated state over all watched sequences.
    fn on_transport_state(&self, _state: TransportState) {}

    fn on_sequence_state(&self, _sequence: i32, _state: TransportState) {}

    /// A discovery run finished.
    fn on_sequences_updated(&self, _sequences: &[SequenceInfo]) {}

    /// The connection is gone and will not come back by itself.
    fn on_transport_error(&self, _error: &PbauError) {}

    fn on_debug(&self, _message: &str) {}
}

/// Handler that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandler;

impl EventHandler for NoopHandler {}

// ── Event ────────────────────────────────────────────────────────

/// Owned form of a callback, for consumers that prefer a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    SequenceTime { sequence: i32, time: Timecode },
    NextCueTime { sequence: i32, time: Timecode },
    TransportState { state: TransportState },
    SequenceState { sequence: i32, state: TransportState },
    SequencesUpdated { sequences: Vec<SequenceInfo> },
    TransportError { message: String },
    Debug { message: String },
}

/// Forwards every callback into a channel. A closed receiver is ignored.
impl EventHandler for mpsc::UnboundedSender<Event> {
    fn on_sequence_time(&self, sequence: i32, time: Timecode) {
        let _ = self.send(Event::SequenceTime { sequence, time });
    }

    fn on_next_cue_time(&self, sequence: i32, time: Timecode) {
        let _ = self.send(Event::NextCueTime { sequence, time });
    }

    fn on_transport_state(&self, state: TransportState) {
        let _ = self.send(Event::TransportState { state });
    }

    fn on_sequence_state(&self, sequence: i32, state: TransportState) {
        let _ = self.send(Event::SequenceState { sequence, state });
    }

    fn on_sequences_updated(&self, sequences: &[SequenceInfo]) {
        let _ = self.send(Event::SequencesUpdated {
            sequences: sequences.to_vec(),
        });
    }

    fn on_transport_error(&self, error: &PbauError) {
        let _ = self.send(Event::TransportError {
            message: error.to_string(),
        });
    }

    fn on_debug(&self, message: &str) {
        let _ = self.send(Event::Debug {
            message: message.to_owned(),
        });
    }
}
