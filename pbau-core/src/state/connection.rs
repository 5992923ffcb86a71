//! Connection lifecycle shared by control and timecode connections.
//!
//! Provides a `ConnectionPhase` enum with validated transitions that
//! return `Result` instead of panicking.

use std::time::Instant;

use crate::error::PbauError;

// ── ConnectionPhase ──────────────────────────────────────────────

/// The current phase of a PBAU connection.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected
///       ▲               │              │
///       │               ▼              ▼
///       └──────── Disconnecting ◄──────┘
/// ```
///
/// There is no handshake: the socket being open is the whole of it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No socket. Initial / terminal state.
    #[default]
    Disconnected,

    /// TCP connect in progress. Sends are dropped.
    Connecting,

    /// Socket open, schedulers running.
    Connected {
        /// When the connection entered the `Connected` state.
        since: Instant,
    },

    /// Teardown in progress.
    Disconnecting,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

impl ConnectionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// `Connecting` or `Connected`: a further `connect` is a no-op.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected { .. })
    }

    /// How long the connection has been up. `None` unless connected.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), PbauError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(PbauError::ProtocolViolation(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Valid from: `Connecting`.
    pub fn complete_connect(&mut self) -> Result<(), PbauError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(PbauError::ProtocolViolation(
                "cannot complete connect: not in Connecting state",
            )),
        }
    }

    /// Valid from: `Connecting`, `Connected`.
    pub fn begin_disconnect(&mut self) -> Result<(), PbauError> {
        match self {
            Self::Connecting | Self::Connected { .. } => {
                *self = Self::Disconnecting;
                Ok(())
            }
            _ => Err(PbauError::ProtocolViolation(
                "cannot disconnect: not in Connecting or Connected state",
            )),
        }
    }

    /// Valid from: `Disconnecting`, `Connecting` (connect failure).
    pub fn finish_disconnect(&mut self) -> Result<(), PbauError> {
        match self {
            Self::Disconnecting | Self::Connecting => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(PbauError::ProtocolViolation(
                "cannot finish disconnect: not in a disconnectable state",
            )),
        }
    }

    /// Force-reset to `Disconnected` regardless of current state.
    ///
    /// Use this for unrecoverable errors (e.g. I/O failure mid-stream).
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────
