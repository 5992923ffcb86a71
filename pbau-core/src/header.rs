//! Fixed 17-byte PBAU frame header.
//!
//! ```text
//! offset  size  field
//!  0      4     magic "PBAU"
//!  4      1     pre-header (always 1)
//!  5      4     domain (i32, big-endian)
//!  9      2     body length (big-endian, hi = len / 256, lo = len % 256)
//! 11      5     reserved (zero)
//! 16      1     checksum (sum of bytes 5..16 mod 256)
//! ```

use crate::error::PbauError;

pub const MAGIC: &[u8; 4] = b"PBAU";
pub const PRE_HEADER: u8 = 1;
pub const HEADER_LENGTH: usize = 17;

/// Number of bytes folded into the checksum, ending right before it.
pub const CHECKSUM_SPAN: usize = 11;
const CHECKSUM_OFFSET: usize = HEADER_LENGTH - 1;

pub type PbauHeaderBytes = [u8; HEADER_LENGTH];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PbauHeader {
    domain: i32,
    body_length: u16,
    checksum: u8,
}

impl PbauHeader {
    pub fn new(domain: i32, body_length: u16) -> Self {
        let mut header = Self {
            domain,
            body_length,
            checksum: 0,
        };
        header.checksum = checksum(&header.to_bytes());
        header
    }

    pub fn to_bytes(&self) -> PbauHeaderBytes {
        let mut bytes: PbauHeaderBytes = [0; HEADER_LENGTH];
        bytes[0..4].copy_from_slice(MAGIC);
        bytes[4] = PRE_HEADER;
        bytes[5..9].copy_from_slice(&self.domain.to_be_bytes());
        let len = self.body_length as usize;
        bytes[9] = (len / 256) as u8;
        bytes[10] = (len % 256) as u8;
        // bytes[11..16] reserved
        bytes[CHECKSUM_OFFSET] = checksum(&bytes);
        bytes
    }

    /// Parse a header. Only the magic is validated; the checksum is kept
    /// as received.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PbauError> {
        if bytes.len() < HEADER_LENGTH {
            return Err(PbauError::FrameTooShort {
                len: bytes.len(),
                min: HEADER_LENGTH,
            });
        }
        if &bytes[0..4] != MAGIC {
            return Err(PbauError::InvalidMagic);
        }
        Ok(Self {
            domain: i32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
            body_length: u16::from_be_bytes([bytes[9], bytes[10]]),
            checksum: bytes[CHECKSUM_OFFSET],
        })
    }

    pub fn domain(&self) -> i32 {
        self.domain
    }

    pub fn body_length(&self) -> u16 {
        self.body_length
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Recompute the checksum and compare it with the received one.
    pub fn checksum_ok(&self) -> bool {
        let expected = Self::new(self.domain, self.body_length).checksum;
        expected == self.checksum
    }
}

/// Sum modulo 256 of the [`CHECKSUM_SPAN`] bytes preceding the checksum slot.
pub fn checksum(header: &PbauHeaderBytes) -> u8 {
    header[CHECKSUM_OFFSET - CHECKSUM_SPAN..CHECKSUM_OFFSET]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
}
