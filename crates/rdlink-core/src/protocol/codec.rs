//! Wire codec for rdlink messages.
//!
//! Format: 4-byte little-endian length prefix + bincode-encoded Message
//!
//! The codec ensures:
//! - Messages are length-prefixed for stream framing
//! - Maximum message size is enforced
//! - Partial reads return Ok(None) to support streaming

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::constants::MAX_MESSAGE_SIZE;
use crate::error::{Error, Result};
use crate::protocol::Message;

/// Length of the frame header (4 bytes, little-endian u32).
pub const FRAME_HEADER_LEN: usize = 4;

/// Codec for length-prefixed bincode encoding of messages.
pub struct Codec;

impl Codec {
    /// Encode a message to bytes with length prefix.
    ///
    /// Returns the encoded bytes including the 4-byte length header.
    pub fn encode(msg: &Message) -> Result<Bytes> {
        let payload = bincode::serialize(msg).map_err(|e| Error::Codec {
            message: format!("serialization failed: {}", e),
        })?;

        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(Error::Codec {
                message: format!(
                    "message too large: {} bytes (max {})",
                    payload.len(),
                    MAX_MESSAGE_SIZE
                ),
            });
        }

        let len = payload.len() as u32;
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
        buf.put_u32_le(len);
        buf.put_slice(&payload);

        Ok(buf.freeze())
    }

    /// Decode a message from a buffer.
    ///
    /// Returns:
    /// - Ok(Some(msg)) if a complete message was decoded (buffer is advanced)
    /// - Ok(None) if more data is needed (buffer unchanged)
    /// - Err if the data is invalid
    ///
    /// The buffer is only consumed on successful decode.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Message>> {
        // Need at least 4 bytes for length
        if buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        // Peek the length without consuming
        let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

        // Check for oversized message before waiting for more data
        if len > MAX_MESSAGE_SIZE {
            return Err(Error::Codec {
                message: format!("message length {} exceeds maximum {}", len, MAX_MESSAGE_SIZE),
            });
        }

        // Check if we have the full message
        if buf.len() < FRAME_HEADER_LEN + len {
            return Ok(None);
        }

        // Consume the header
        buf.advance(FRAME_HEADER_LEN);

        // Consume and decode the payload
        let payload = buf.split_to(len);
        let msg = bincode::deserialize(&payload).map_err(|e| Error::Codec {
            message: format!("deserialization failed: {}", e),
        })?;

        Ok(Some(msg))
    }

    /// Decode from a slice (convenience for testing).
    /// Note: This creates a BytesMut copy; for streaming use decode() directly.
    pub fn decode_slice(data: &[u8]) -> Result<Option<Message>> {
        let mut buf = BytesMut::from(data);
        Self::decode(&mut buf)
    }
}
