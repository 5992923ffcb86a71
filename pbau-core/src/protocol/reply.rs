//! Inbound replies.
//!
//! Replies echo the request's command identifier but never the entity it
//! was about; matching a reply to a sequence is the caller's job.
//!
//! ```text
//! GetSequenceTransportMode   mode:i32
//! GetSequenceTime            h:i32 m:i32 s:i32 f:i32
//! GetRemainingTimeUntilNextCue h:i32 m:i32 s:i32 f:i32
//! GetSequenceIds             count:i32  unused:4  ids:[i32 LE; count]
//! GetSequenceName            name:string
//! Error (0xFFFF)             -
//! ```

use crate::error::PbauError;
use crate::message::{Command, Timecode, TransportState};
use crate::packet::Frame;
use crate::payload::PayloadReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    TransportMode(TransportState),
    SequenceTime(Timecode),
    RemainingTime(Timecode),
    SequenceIds(Vec<i32>),
    SequenceName(String),
    /// The server rejected the outstanding request.
    Error,
    /// A known command with no reply layout (acknowledgements).
    Ack(Command),
}

impl Reply {
    pub fn parse(frame: &Frame) -> Result<Self, PbauError> {
        if frame.is_error() {
            return Ok(Reply::Error);
        }
        let command = frame.command()?;
        let mut r = PayloadReader::new(frame.payload());
        let reply = match command {
            Command::GetSequenceTransportMode => {
                Reply::TransportMode(TransportState::from_wire(r.i32_be()?))
            }
            Command::GetSequenceTime => Reply::SequenceTime(read_timecode(&mut r)?),
            Command::GetRemainingTimeUntilNextCue => {
                Reply::RemainingTime(read_timecode(&mut r)?)
            }
            Command::GetSequenceIds => Reply::SequenceIds(read_ids(&mut r)?),
            Command::GetSequenceName => Reply::SequenceName(r.string()?),
            Command::Error => Reply::Error,
            other => Reply::Ack(other),
        };
        Ok(reply)
    }
}

fn read_timecode(r: &mut PayloadReader<'_>) -> Result<Timecode, PbauError> {
    Ok(Timecode {
        hours: r.i32_be()?,
        minutes: r.i32_be()?,
        seconds: r.i32_be()?,
        frames: r.i32_be()?,
    })
}

fn read_ids(r: &mut PayloadReader<'_>) -> Result<Vec<i32>, PbauError> {
    let count = r.i32_be()?.max(0) as usize;
    r.skip(4)?;
    // Cap the allocation by what the payload can actually hold.
    let mut ids = Vec::with_capacity(count.min(r.remaining() / 4));
    for _ in 0..count {
        ids.push(r.i32_le()?);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, Bytes, BytesMut};

    use super::*;

    fn frame(command: Command, payload: &[u8]) -> Frame {
        Frame::new(0, command, Bytes::copy_from_slice(payload)).unwrap()
    }

    #[test]
    fn transport_mode() {
        let f = frame(Command::GetSequenceTransportMode, &[0, 0, 0, 3]);
        assert_eq!(
            Reply::parse(&f).unwrap(),
            Reply::TransportMode(TransportState::Pause)
        );
    }

    #[test]
    fn sequence_time() {
        let mut p = BytesMut::new();
        for v in [1, 2, 3, 4] {
            p.put_i32(v);
        }
        let f = frame(Command::GetSequenceTime, &p);
        assert_eq!(
            Reply::parse(&f).unwrap(),
            Reply::SequenceTime(Timecode {
                hours: 1,
                minutes: 2,
                seconds: 3,
                frames: 4
            })
        );
    }

    #[test]
    fn sequence_ids_are_little_endian() {
        let mut p = BytesMut::new();
        p.put_i32(3);
        p.put_slice(&[0xAA; 4]);
        for id in [3, 7, 2] {
            p.put_i32_le(id);
        }
        let f = frame(Command::GetSequenceIds, &p);
        assert_eq!(Reply::parse(&f).unwrap(), Reply::SequenceIds(vec![3, 7, 2]));
    }

    #[test]
    fn sequence_ids_truncated() {
        let mut p = BytesMut::new();
        p.put_i32(2);
        p.put_i32(0);
        p.put_i32_le(5);
        let f = frame(Command::GetSequenceIds, &p);
        assert!(Reply::parse(&f).is_err());
    }

    #[test]
    fn sequence_name() {
        let f = frame(Command::GetSequenceName, &[0, 5, b'A', b'c', b't', b' ', b'1']);
        assert_eq!(
            Reply::parse(&f).unwrap(),
            Reply::SequenceName("Act 1".into())
        );
    }

    #[test]
    fn error_sentinel() {
        let f = Frame::bare(0, Command::Error);
        assert_eq!(Reply::parse(&f).unwrap(), Reply::Error);
    }

    #[test]
    fn acknowledgement() {
        let f = Frame::bare(0, Command::SaveProject);
        assert_eq!(Reply::parse(&f).unwrap(), Reply::Ack(Command::SaveProject));
    }
}
