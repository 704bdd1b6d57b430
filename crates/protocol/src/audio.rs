//! Audio datagram header (§4.1)
//!
//! The relay never decodes the Opus payload; it only needs to read the
//! 16-byte header to find the sending `client_id` and forward the datagram
//! unchanged. Deliberately not serde-based — this is a fixed binary layout,
//! not JSON.
//!
//! ```text
//! Offset  Len  Description
//! ------  ---  -----------
//!  0       4   client_id (big-endian u32)
//!  4      12   AES-GCM nonce (96 bits)
//! 16+      N   ciphertext || 16-byte auth tag
//! ```

/// Header length in bytes.
pub const HEADER_LEN: usize = 16;

/// Minimum well-formed datagram length: header + empty ciphertext + tag.
pub const MIN_DATAGRAM_LEN: usize = HEADER_LEN + 16;

/// Plaintext Opus frames are at most 1275 bytes (20ms @ 48kHz mono); add
/// nonce/tag/header overhead for a generous relay-side sanity bound.
pub const MAX_DATAGRAM_LEN: usize = HEADER_LEN + 1275 + 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AudioHeaderError {
    #[error("datagram too short: {0} bytes (minimum {MIN_DATAGRAM_LEN})")]
    TooShort(usize),
    #[error("datagram too long: {0} bytes (maximum {MAX_DATAGRAM_LEN})")]
    TooLong(usize),
}

/// Parsed view over an audio datagram's fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioHeader {
    pub client_id: u32,
    pub nonce: [u8; 12],
}

impl AudioHeader {
    /// Parses the header from the front of a datagram. Returns the header
    /// and the byte offset where the ciphertext begins.
    pub fn parse(datagram: &[u8]) -> Result<(Self, &[u8]), AudioHeaderError> {
        if datagram.len() < MIN_DATAGRAM_LEN {
            return Err(AudioHeaderError::TooShort(datagram.len()));
        }
        if datagram.len() > MAX_DATAGRAM_LEN {
            return Err(AudioHeaderError::TooLong(datagram.len()));
        }

        let client_id = u32::from_be_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&datagram[4..16]);

        Ok((Self { client_id, nonce }, &datagram[HEADER_LEN..]))
    }

    /// Serializes the header, ready to be followed by ciphertext||tag.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&self.client_id.to_be_bytes());
        buf[4..16].copy_from_slice(&self.nonce);
        buf
    }
}
