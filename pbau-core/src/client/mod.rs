//! Connections as the consumer sees them.
//!
//! [`ControlConnection`] is the entry point; it owns one
//! [`TimecodeConnection`] per watched sequence.

pub mod control;
pub mod timecode;

pub use control::{ControlConnection, ControlOptions, MIN_STATUS_INTERVAL, STATUS_POLL_INTERVAL};
pub use timecode::{IDLE_INTERVAL, PLAYING_INTERVAL, TimecodeConnection, poll_interval};
