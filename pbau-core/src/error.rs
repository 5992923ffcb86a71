//! Domain-specific error types for the PBAU protocol.
//!
//! All fallible operations return `Result<T, PbauError>`.
//! Frame-level problems are recoverable; see [`PbauError::is_frame_local`].

use thiserror::Error;

/// The canonical error type for the PBAU protocol engine.
#[derive(Debug, Error)]
pub enum PbauError {
    // ── Frame Errors ─────────────────────────────────────────────
    /// Received bytes that do not start with the `PBAU` marker.
    #[error("invalid magic bytes: expected PBAU")]
    InvalidMagic,

    /// The buffer cannot hold even a header and a command identifier.
    #[error("frame too short: {len} bytes (min {min})")]
    FrameTooShort { len: usize, min: usize },

    /// The frame belongs to a different server domain.
    #[error("domain mismatch: expected {expected}, got {actual}")]
    DomainMismatch { expected: i32, actual: i32 },

    /// The header declares more body bytes than the buffer carries.
    #[error("truncated frame: body declares {declared} bytes, {available} available")]
    TruncatedFrame { declared: usize, available: usize },

    /// A payload field ran past the end of the body.
    #[error("truncated payload while reading {0}")]
    TruncatedPayload(&'static str),

    /// The body exceeds what the 16-bit length field can express.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: i64 },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The peer closed the socket.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// A connection phase transition was not allowed.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl PbauError {
    /// Whether this error only concerns a single frame and the stream
    /// can keep going.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            PbauError::InvalidMagic
                | PbauError::FrameTooShort { .. }
                | PbauError::DomainMismatch { .. }
                | PbauError::TruncatedFrame { .. }
                | PbauError::TruncatedPayload(_)
                | PbauError::UnknownVariant { .. }
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for PbauError {
    fn from(s: String) -> Self {
        PbauError::Other(s)
    }
}

impl From<&str> for PbauError {
    fn from(s: &str) -> Self {
        PbauError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for PbauError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        PbauError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = PbauError::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = PbauError::DomainMismatch {
            expected: 3,
            actual: 9,
        };
        assert!(e.to_string().contains('3'));
        assert!(e.to_string().contains('9'));
    }

    #[test]
    fn from_string() {
        let e: PbauError = "something broke".into();
        assert!(matches!(e, PbauError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: PbauError = io_err.into();
        assert!(matches!(e, PbauError::Connection(_)));
        assert!(!e.is_frame_local());
    }

    #[test]
    fn frame_errors_are_local() {
        assert!(PbauError::InvalidMagic.is_frame_local());
        assert!(PbauError::TruncatedPayload("name").is_frame_local());
        assert!(!PbauError::ConnectionClosed.is_frame_local());
    }
}
