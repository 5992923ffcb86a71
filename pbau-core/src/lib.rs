//! # pbau-core
//!
//! Client library for the PandorasAutomation (`PBAU`) show-control protocol.
//!
//! This crate contains:
//! - **Wire types**: `PbauHeader`, `Frame`, `Command`, payload reader/writer
//! - **Protocol payloads**: typed `Request`s and `Reply`s
//! - **Codec**: `PbauCodec` for framed TCP I/O via `tokio_util`
//! - **Network**: `PbauConnection`, a framed socket split into reader/writer tasks
//! - **State**: status-poll and discovery state machines, connection phases
//! - **Client**: `ControlConnection` and `TimecodeConnection`
//! - **Events**: the `EventHandler` callback trait
//! - **Error**: `PbauError`, a `thiserror`-based error type

pub mod client;
pub mod codec;
pub mod error;
pub mod events;
pub mod header;
pub mod message;
pub mod network;
pub mod packet;
pub mod payload;
pub mod protocol;
pub mod state;
pub mod task;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::{ControlConnection, ControlOptions, TimecodeConnection};
pub use codec::PbauCodec;
pub use error::PbauError;
pub use events::{Event, EventHandler, NoopHandler};
pub use header::{HEADER_LENGTH, PbauHeader};
pub use message::{Command, SequenceInfo, SmpteMode, Timecode, TransportState};
pub use network::{Connection, ConnectionInfo, ConnectionSender, DEFAULT_PORT, PbauConnection};
pub use packet::{Frame, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, MIN_FRAME_SIZE};
pub use protocol::{Reply, Request};
pub use state::{ConnectionPhase, ControlState, Discovery, Effect};
pub use task::Task;
