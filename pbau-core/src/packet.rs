use std::fmt::Debug;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::PbauError;
use crate::header::{self, PbauHeader};
use crate::message::Command;

/// Size of the command identifier at the start of every body.
pub const COMMAND_ID_LENGTH: usize = 2;
/// Offset of the command identifier within a frame.
pub const COMMAND_OFFSET: usize = header::HEADER_LENGTH;
/// Offset at which command payload fields start.
pub const PAYLOAD_OFFSET: usize = COMMAND_OFFSET + COMMAND_ID_LENGTH;
/// Smallest well-formed frame: header plus command identifier.
pub const MIN_FRAME_SIZE: usize = PAYLOAD_OFFSET;
/// Largest body the 16-bit length can describe.
pub const MAX_BODY_SIZE: usize = u16::MAX as usize;
pub const MAX_PAYLOAD_SIZE: usize = MAX_BODY_SIZE - COMMAND_ID_LENGTH;
pub const MAX_FRAME_SIZE: usize = header::HEADER_LENGTH + MAX_BODY_SIZE;

/// One protocol frame.
///
/// The command is kept as the raw wire identifier so unknown replies
/// can still be logged; use [`Frame::command`] for the typed view.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    domain: i32,
    command_id: u16,
    payload: Bytes,
    checksum_ok: bool,
}

impl Frame {
    pub fn new(domain: i32, command: Command, payload: Bytes) -> Result<Self, PbauError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PbauError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self {
            domain,
            command_id: command.id(),
            payload,
            checksum_ok: true,
        })
    }

    /// A frame with no payload fields.
    pub fn bare(domain: i32, command: Command) -> Self {
        Self {
            domain,
            command_id: command.id(),
            payload: Bytes::new(),
            checksum_ok: true,
        }
    }

    pub fn domain(&self) -> i32 {
        self.domain
    }

    pub fn command_id(&self) -> u16 {
        self.command_id
    }

    pub fn command(&self) -> Result<Command, PbauError> {
        Command::try_from(self.command_id)
    }

    pub fn is_error(&self) -> bool {
        self.command_id == Command::Error.id()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Result of the receive-side checksum check. Informational only.
    pub fn checksum_ok(&self) -> bool {
        self.checksum_ok
    }

    pub fn encoded_len(&self) -> usize {
        MIN_FRAME_SIZE + self.payload.len()
    }

    pub fn encode_into(&self, dst: &mut BytesMut) {
        let body_length = (COMMAND_ID_LENGTH + self.payload.len()) as u16;
        dst.reserve(self.encoded_len());
        dst.put_slice(&PbauHeader::new(self.domain, body_length).to_bytes());
        dst.put_u16(self.command_id);
        dst.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Decode one frame from the start of `bytes`, validating it against
    /// the locally configured `domain`.
    ///
    /// Bytes past the declared body length are ignored.
    pub fn decode(bytes: &[u8], domain: i32) -> Result<Self, PbauError> {
        if bytes.len() < MIN_FRAME_SIZE {
            return Err(PbauError::FrameTooShort {
                len: bytes.len(),
                min: MIN_FRAME_SIZE,
            });
        }
        let header = PbauHeader::from_bytes(bytes)?;
        if header.domain() != domain {
            return Err(PbauError::DomainMismatch {
                expected: domain,
                actual: header.domain(),
            });
        }
        let body_length = header.body_length() as usize;
        let available = bytes.len() - header::HEADER_LENGTH;
        if body_length > available {
            return Err(PbauError::TruncatedFrame {
                declared: body_length,
                available,
            });
        }
        if body_length < COMMAND_ID_LENGTH {
            return Err(PbauError::FrameTooShort {
                len: header::HEADER_LENGTH + body_length,
                min: MIN_FRAME_SIZE,
            });
        }
        let command_id = u16::from_be_bytes([bytes[COMMAND_OFFSET], bytes[COMMAND_OFFSET + 1]]);
        let end = header::HEADER_LENGTH + body_length;
        Ok(Self {
            domain: header.domain(),
            command_id,
            payload: Bytes::copy_from_slice(&bytes[PAYLOAD_OFFSET..end]),
            checksum_ok: header.checksum_ok(),
        })
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let command = match self.command() {
            Ok(cmd) => cmd.to_string(),
            Err(_) => format!("{:#06x}", self.command_id),
        };
        f.debug_struct("Frame")
            .field("domain", &self.domain)
            .field("command", &command)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{PayloadReader, PayloadWriter};

    #[test]
    fn encode_layout() {
        let payload = PayloadWriter::new().int(4).finish();
        let frame = Frame::new(2, Command::GetSequenceTime, payload).unwrap();
        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), 23);
        assert_eq!(&bytes[0..4], b"PBAU");
        assert_eq!(&bytes[5..9], &[0, 0, 0, 2]);
        // body = 2 (command) + 4 (int)
        assert_eq!(&bytes[9..11], &[0, 6]);
        assert_eq!(&bytes[17..19], &[0, 72]);
        assert_eq!(&bytes[19..23], &[0, 0, 0, 4]);
    }

    #[test]
    fn decode_recovers_command_and_fields() {
        let payload = PayloadWriter::new()
            .int(12)
            .boolean(true)
            .string("10.0.0.5")
            .finish();
        let frame = Frame::new(0, Command::SetSiteIp, payload).unwrap();
        let decoded = Frame::decode(&frame.to_bytes(), 0).unwrap();

        assert_eq!(decoded.command().unwrap(), Command::SetSiteIp);
        let mut r = PayloadReader::new(decoded.payload());
        assert_eq!(r.i32_be().unwrap(), 12);
        assert!(r.boolean().unwrap());
        assert_eq!(r.string().unwrap(), "10.0.0.5");
        assert!(decoded.checksum_ok());
    }

    #[test]
    fn bare_frame_is_minimum_size() {
        let bytes = Frame::bare(0, Command::SaveProject).to_bytes();
        assert_eq!(bytes.len(), MIN_FRAME_SIZE);
        let decoded = Frame::decode(&bytes, 0).unwrap();
        assert!(decoded.payload().is_empty());
    }

    #[test]
    fn rejects_short_buffer() {
        let bytes = Frame::bare(0, Command::SaveProject).to_bytes();
        assert!(matches!(
            Frame::decode(&bytes[..18], 0),
            Err(PbauError::FrameTooShort { len: 18, .. })
        ));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Frame::bare(0, Command::SaveProject).to_bytes().to_vec();
        bytes[3] = b'X';
        assert!(matches!(Frame::decode(&bytes, 0), Err(PbauError::InvalidMagic)));
    }

    #[test]
    fn rejects_foreign_domain() {
        let bytes = Frame::bare(4, Command::SaveProject).to_bytes();
        assert!(matches!(
            Frame::decode(&bytes, 5),
            Err(PbauError::DomainMismatch {
                expected: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn rejects_truncated_body() {
        let payload = PayloadWriter::new().int(1).int(2).finish();
        let bytes = Frame::new(0, Command::MoveSequenceToCue, payload)
            .unwrap()
            .to_bytes();
        assert!(matches!(
            Frame::decode(&bytes[..bytes.len() - 1], 0),
            Err(PbauError::TruncatedFrame { .. })
        ));
    }

    #[test]
    fn error_sentinel_detected() {
        let bytes = Frame::bare(0, Command::Error).to_bytes();
        assert_eq!(&bytes[17..19], &[0xFF, 0xFF]);
        assert!(Frame::decode(&bytes, 0).unwrap().is_error());
    }

    #[test]
    fn payload_too_large() {
        let too_large = Bytes::from(vec![0u8; MAX_PAYLOAD_SIZE + 1]);
        assert!(Frame::new(0, Command::SetSiteIp, too_large).is_err());
    }

    #[test]
    fn checksum_mismatch_still_decodes() {
        let mut bytes = Frame::bare(0, Command::ResetAll).to_bytes().to_vec();
        bytes[16] ^= 0xFF;
        let decoded = Frame::decode(&bytes, 0).unwrap();
        assert!(!decoded.checksum_ok());
    }
}
