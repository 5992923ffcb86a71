use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::error::PbauError;
use crate::header::{HEADER_LENGTH, MAGIC, PbauHeader};
use crate::packet::Frame;

/// Stream framing for PBAU over TCP.
///
/// Malformed input never fails the stream: bytes before a `PBAU` marker
/// are skipped, and frames that are too short or belong to another
/// domain are consumed and dropped.
#[derive(Debug, Clone)]
pub struct PbauCodec {
    domain: i32,
    discarded: u64,
}

impl PbauCodec {
    pub fn new(domain: i32) -> Self {
        Self {
            domain,
            discarded: 0,
        }
    }

    pub fn domain(&self) -> i32 {
        self.domain
    }

    /// Frames (or junk runs) dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Drop everything before the next magic marker. Keeps a possible
    /// partial marker at the tail.
    fn resync(&mut self, src: &mut BytesMut) {
        let skip = src[1..]
            .windows(MAGIC.len())
            .position(|w| w == MAGIC)
            .map(|p| p + 1)
            .unwrap_or_else(|| {
                let keep = (1..MAGIC.len())
                    .rev()
                    .find(|&k| k < src.len() && src.ends_with(&MAGIC[..k]))
                    .unwrap_or(0);
                src.len() - keep
            });
        debug!(skipped = skip, "discarding bytes without PBAU marker");
        src.advance(skip);
        self.discarded += 1;
    }
}

impl tokio_util::codec::Decoder for PbauCodec {
    type Item = Frame;
    type Error = PbauError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < MAGIC.len() {
                return Ok(None);
            }
            if &src[..MAGIC.len()] != MAGIC {
                self.resync(src);
                continue;
            }
            if src.len() < HEADER_LENGTH {
                return Ok(None);
            }

            let header = PbauHeader::from_bytes(&src[..HEADER_LENGTH])?;
            let total = HEADER_LENGTH + header.body_length() as usize;
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }

            let raw = src.split_to(total);
            match Frame::decode(&raw, self.domain) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) if e.is_frame_local() => {
                    debug!(error = %e, "discarding malformed frame");
                    self.discarded += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// A partial frame left at end of stream is dropped, not an error.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if !src.is_empty() {
            debug!(leftover = src.len(), "discarding incomplete frame at end of stream");
            src.clear();
            self.discarded += 1;
        }
        Ok(None)
    }
}

impl tokio_util::codec::Encoder<Frame> for PbauCodec {
    type Error = PbauError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst);
        Ok(())
    }
}
