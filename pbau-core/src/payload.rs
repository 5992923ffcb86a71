//! Payload field encoding.
//!
//! Outbound fields: integers are 4-byte big-endian, booleans a single
//! 0/1 byte, strings a 2-byte big-endian length followed by ASCII bytes.
//! Inbound replies use the same rules, except the discovery ID list
//! which is little-endian (see [`PayloadReader::i32_le`]).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::PbauError;

/// Builder for outbound payloads.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int(mut self, value: i32) -> Self {
        self.buf.put_i32(value);
        self
    }

    pub fn boolean(mut self, value: bool) -> Self {
        self.buf.put_u8(value as u8);
        self
    }

    /// Non-ASCII characters are replaced by `?`.
    pub fn string(mut self, value: &str) -> Self {
        let ascii: Vec<u8> = value
            .chars()
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
            .take(u16::MAX as usize)
            .collect();
        self.buf.put_u16(ascii.len() as u16);
        self.buf.put_slice(&ascii);
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over an inbound payload. Every read is bounds-checked.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], PbauError> {
        if self.remaining() < n {
            return Err(PbauError::TruncatedPayload(what));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), PbauError> {
        self.take(n, "reserved bytes").map(|_| ())
    }

    pub fn i32_be(&mut self) -> Result<i32, PbauError> {
        let b = self.take(4, "i32")?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32_le(&mut self) -> Result<i32, PbauError> {
        let b = self.take(4, "i32 (le)")?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u16_be(&mut self) -> Result<u16, PbauError> {
        let b = self.take(2, "u16")?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn boolean(&mut self) -> Result<bool, PbauError> {
        Ok(self.take(1, "bool")?[0] != 0)
    }

    /// Length-prefixed ASCII string. Invalid bytes are replaced, not rejected.
    pub fn string(&mut self) -> Result<String, PbauError> {
        let len = self.u16_be()? as usize;
        let raw = self.take(len, "string")?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }
}
