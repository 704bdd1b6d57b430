//! Control-plane wire format (§4.1)
//!
//! Length-delimited framing: a 4-byte big-endian payload length followed by
//! a JSON object `{ "type": <string>, "payload": <object|null> }`.
//!
//! ```text
//! +----------------+----------------------------+
//! | length (u32 BE)| JSON payload (length bytes) |
//! +----------------+----------------------------+
//! ```
//!
//! The length counts payload bytes only, not the length field itself.
//! Oversize frames are rejected and the connection is closed (§7).

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::control::ControlMessage;

/// Maximum control frame payload size: 1 MiB (§5 capacity limits).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Size of the length prefix in bytes.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// `tokio_util` codec for length-delimited control messages. Implements
/// `Decoder` and `Encoder<ControlMessage>` for use with
/// `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = ControlMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "frame too large: {} bytes (maximum: {} bytes)",
                    length, self.max_frame_size
                ),
            ));
        }

        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let payload = src.split_to(length);

        let message: ControlMessage = serde_json::from_slice(&payload).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("invalid JSON payload: {e}"))
        })?;

        Ok(Some(message))
    }
}

impl Encoder<ControlMessage> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: ControlMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("failed to serialize message: {e}"))
        })?;

        if json.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "message too large: {} bytes (maximum: {} bytes)",
                    json.len(),
                    self.max_frame_size
                ),
            ));
        }

        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);

        Ok(())
    }
}

/// Reads a single frame from an `AsyncRead`.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> io::Result<ControlMessage>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; LENGTH_FIELD_SIZE];
    reader.read_exact(&mut len_buf).await?;
    let length = u32::from_be_bytes(len_buf) as usize;

    if length > max_frame_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes (maximum: {} bytes)", length, max_frame_size),
        ));
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;

    serde_json::from_slice(&payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid JSON payload: {e}")))
}

/// Writes a single frame to an `AsyncWrite`.
pub async fn write_frame<W>(writer: &mut W, message: &ControlMessage, max_frame_size: usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_vec(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("failed to serialize message: {e}")))?;

    if json.len() > max_frame_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large: {} bytes (maximum: {} bytes)", json.len(), max_frame_size),
        ));
    }

    let len_bytes = (json.len() as u32).to_be_bytes();
    writer.write_all(&len_bytes).await?;
    writer.write_all(&json).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlPayload;
    use tokio_util::codec::{Decoder, Encoder};

    fn ping_message(request_id: u32) -> ControlMessage {
        ControlMessage::ping(request_id)
    }

    #[test]
    fn round_trips_a_single_message() {
        let mut codec = FrameCodec::new();
        let original = ping_message(42);

        let mut buf = BytesMut::new();
        codec.encode(original.clone(), &mut buf).unwrap();

        let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert!(payload_len > 0);
        assert_eq!(buf.len(), LENGTH_FIELD_SIZE + payload_len);

        let decoded = codec.decode(&mut buf).unwrap().expect("a message");
        assert_eq!(decoded.request_id, 42);
        assert!(matches!(decoded.payload, ControlPayload::Ping));
    }

    #[test]
    fn waits_for_a_full_frame() {
        let mut codec = FrameCodec::new();
        let original = ping_message(1);

        let mut buf = BytesMut::new();
        codec.encode(original, &mut buf).unwrap();

        let half = buf.len() / 2;
        let mut partial = buf.split_to(half);

        let result = codec.decode(&mut partial).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn waits_when_length_field_incomplete() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        let result = codec.decode(&mut buf).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn rejects_oversize_frame_on_decode() {
        let mut codec = FrameCodec::with_max_size(100);

        let mut buf = BytesMut::new();
        buf.put_u32(200);
        buf.put_slice(&[b'x'; 200]);

        let result = codec.decode(&mut buf);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_oversize_message_on_encode() {
        let mut codec = FrameCodec::with_max_size(10);
        let original = ping_message(1);

        let mut buf = BytesMut::new();
        let result = codec.encode(original, &mut buf);
        assert!(result.is_err());
    }

    #[test]
    fn decodes_multiple_buffered_messages() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        for i in 0..3u32 {
            codec.encode(ping_message(i), &mut buf).unwrap();
        }

        for i in 0..3u32 {
            let msg = codec.decode(&mut buf).unwrap().expect("a message");
            assert_eq!(msg.request_id, i);
        }

        assert!(buf.is_empty());
    }

    #[test]
    fn default_max_size_is_one_mebibyte() {
        let codec = FrameCodec::new();
        assert_eq!(codec.max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
    }

    #[tokio::test]
    async fn async_helpers_round_trip() {
        let original = ping_message(99);

        let mut buffer: Vec<u8> = Vec::new();
        write_frame(&mut buffer, &original, DEFAULT_MAX_FRAME_SIZE).await.unwrap();

        assert!(buffer.len() > LENGTH_FIELD_SIZE);

        let mut cursor = io::Cursor::new(buffer);
        let decoded = read_frame(&mut cursor, DEFAULT_MAX_FRAME_SIZE).await.unwrap();

        assert_eq!(decoded.request_id, 99);
        assert!(matches!(decoded.payload, ControlPayload::Ping));
    }

    #[tokio::test]
    async fn async_read_rejects_oversize_frame() {
        let mut buffer: Vec<u8> = Vec::new();
        buffer.extend_from_slice(&(2u32 * 1024 * 1024).to_be_bytes());

        let mut cursor = io::Cursor::new(buffer);
        let result = read_frame(&mut cursor, DEFAULT_MAX_FRAME_SIZE).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn async_write_rejects_oversize_message() {
        let original = ping_message(1);
        let mut buffer: Vec<u8> = Vec::new();
        let result = write_frame(&mut buffer, &original, 5).await;
        assert!(result.is_err());
    }
}
