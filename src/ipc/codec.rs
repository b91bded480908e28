//! Length-prefixed framing of JSON payloads
//!
//! Every frame is an 8-byte little-endian header (opcode, body length)
//! followed by exactly `length` bytes of UTF-8 JSON.

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, BytesMut};
use serde::Serialize;
use serde_json::Value;

use crate::error::{DiscordIpcError, ProtocolContext, Result};
use crate::ipc::protocol::{constants, Opcode};

/// One decoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Value,
}

impl Frame {
    pub fn new(opcode: Opcode, payload: Value) -> Self {
        Self { opcode, payload }
    }

    /// Top-level `evt` field, if present and a string
    pub fn evt(&self) -> Option<&str> {
        self.payload.get("evt").and_then(Value::as_str)
    }

    /// Top-level `nonce` field, if present and a string
    pub fn nonce(&self) -> Option<&str> {
        self.payload.get("nonce").and_then(Value::as_str)
    }
}

pub(crate) fn error_message(payload: &Value) -> &str {
    payload
        .get("data")
        .and_then(|data| data.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
}

/// Serialize `payload` and prepend the frame header
pub fn encode<T: Serialize + ?Sized>(opcode: Opcode, payload: &T) -> Result<Vec<u8>> {
    let raw = serde_json::to_vec(payload)?;
    let length = u32::try_from(raw.len()).map_err(|_| {
        DiscordIpcError::protocol_violation(
            format!("Payload of {} bytes does not fit a frame", raw.len()),
            ProtocolContext::default(),
        )
    })?;

    let mut buffer = BytesMut::with_capacity(constants::IPC_HEADER_SIZE + raw.len());
    buffer.put_u32_le(opcode.into());
    buffer.put_u32_le(length);
    buffer.extend_from_slice(&raw);

    Ok(buffer.to_vec())
}

/// Parse the 8-byte header into opcode and body length
pub fn decode_header(header: &[u8]) -> Result<(Opcode, u32)> {
    if header.len() < constants::IPC_HEADER_SIZE {
        return Err(DiscordIpcError::protocol_violation(
            format!("Frame header needs 8 bytes, got {}", header.len()),
            ProtocolContext::default(),
        ));
    }

    let mut reader = &header[..constants::IPC_HEADER_SIZE];
    let opcode_raw = reader.read_u32::<LittleEndian>()?;
    let length = reader.read_u32::<LittleEndian>()?;

    Ok((Opcode::try_from(opcode_raw)?, length))
}

/// Decode a complete frame from its header and body bytes
pub fn decode(header: &[u8], body: &[u8]) -> Result<Frame> {
    let (opcode, length) = decode_header(header)?;

    if body.len() != length as usize {
        return Err(DiscordIpcError::protocol_violation(
            format!(
                "Frame announced {} bytes but {} were supplied",
                length,
                body.len()
            ),
            ProtocolContext::with_payload_size(length),
        ));
    }

    let payload = serde_json::from_slice(body).map_err(|err| {
        DiscordIpcError::protocol_violation(
            format!("Frame body is not valid JSON: {}", err),
            ProtocolContext {
                received_opcode: Some(opcode.into()),
                payload_size: Some(length),
                ..ProtocolContext::default()
            },
        )
    })?;

    Ok(Frame { opcode, payload })
}

/// Accumulates raw bytes from the stream until whole frames are available
///
/// Bytes of a frame that has not fully arrived stay buffered, so a read
/// that times out halfway through a frame can be resumed later.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_payload_size: u32,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(constants::MAX_PAYLOAD_SIZE)
    }
}

impl FrameBuffer {
    const INITIAL_CAPACITY: usize = 4096;

    pub fn new(max_payload_size: u32) -> Self {
        Self {
            buf: BytesMut::with_capacity(Self::INITIAL_CAPACITY),
            max_payload_size,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed as frames
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Pop the next complete frame, or `None` if more bytes are needed
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() < constants::IPC_HEADER_SIZE {
            return Ok(None);
        }

        let (_, length) = decode_header(&self.buf[..constants::IPC_HEADER_SIZE])?;
        if length > self.max_payload_size {
            return Err(DiscordIpcError::protocol_violation(
                format!(
                    "Payload size {} exceeds maximum allowed size of {} bytes",
                    length, self.max_payload_size
                ),
                ProtocolContext::with_payload_size(length),
            ));
        }

        let total = constants::IPC_HEADER_SIZE + length as usize;
        if self.buf.len() < total {
            return Ok(None);
        }

        let frame_bytes = self.buf.split_to(total);
        let frame = decode(
            &frame_bytes[..constants::IPC_HEADER_SIZE],
            &frame_bytes[constants::IPC_HEADER_SIZE..],
        )?;

        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_writes_little_endian_header() {
        let bytes = encode(Opcode::Frame, &json!({"cmd": "GET_GUILDS"})).unwrap();
        let body = br#"{"cmd":"GET_GUILDS"}"#;
        assert_eq!(&bytes[..4], &1u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(body.len() as u32).to_le_bytes());
        assert_eq!(&bytes[8..], body);
    }

    #[test]
    fn length_counts_utf8_bytes_not_chars() {
        let bytes = encode(Opcode::Frame, &json!({"state": "héllo ✓"})).unwrap();
        let (_, length) = decode_header(&bytes).unwrap();
        assert_eq!(length as usize, bytes.len() - 8);
    }

    #[test]
    fn decode_rejects_short_body() {
        let bytes = encode(Opcode::Frame, &json!({"a": 1})).unwrap();
        let err = decode(&bytes[..8], &bytes[8..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, DiscordIpcError::ProtocolViolation { .. }));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let mut header = Vec::new();
        header.extend_from_slice(&1u32.to_le_bytes());
        header.extend_from_slice(&3u32.to_le_bytes());
        let err = decode(&header, b"{{{").unwrap_err();
        assert!(matches!(err, DiscordIpcError::ProtocolViolation { .. }));
    }

    #[test]
    fn every_opcode_survives_encode_and_decode() {
        let payload = json!({
            "cmd": "SET_ACTIVITY",
            "args": {"activity": {"state": "日本語 ✓ café", "details": "🎮"}},
            "nonce": "n"
        });
        for opcode in [
            Opcode::Handshake,
            Opcode::Frame,
            Opcode::Close,
            Opcode::Ping,
            Opcode::Pong,
        ] {
            let bytes = encode(opcode, &payload).unwrap();
            let frame = decode(&bytes[..8], &bytes[8..]).unwrap();
            assert_eq!(frame, Frame::new(opcode, payload.clone()));
        }
    }

    #[test]
    fn error_message_falls_back_when_missing() {
        assert_eq!(error_message(&json!({"data": {"message": "nope"}})), "nope");
        assert_eq!(error_message(&json!({"evt": "ERROR"})), "Unknown error");
    }

    #[test]
    fn frame_buffer_waits_for_whole_frame() {
        let bytes = encode(Opcode::Frame, &json!({"evt": "READY"})).unwrap();
        let mut buffer = FrameBuffer::default();

        buffer.extend(&bytes[..5]);
        assert!(buffer.next_frame().unwrap().is_none());
        buffer.extend(&bytes[5..12]);
        assert!(buffer.next_frame().unwrap().is_none());
        assert_eq!(buffer.buffered(), 12);

        buffer.extend(&bytes[12..]);
        let frame = buffer.next_frame().unwrap().expect("complete frame");
        assert_eq!(frame.evt(), Some("READY"));
        assert_eq!(buffer.buffered(), 0);
    }

    #[test]
    fn frame_buffer_splits_back_to_back_frames() {
        let mut bytes = encode(Opcode::Ping, &json!({"n": 1})).unwrap();
        bytes.extend(encode(Opcode::Frame, &json!({"n": 2})).unwrap());
        let mut buffer = FrameBuffer::default();
        buffer.extend(&bytes);

        let first = buffer.next_frame().unwrap().unwrap();
        let second = buffer.next_frame().unwrap().unwrap();
        assert_eq!(first.opcode, Opcode::Ping);
        assert_eq!(second.payload["n"], 2);
        assert!(buffer.next_frame().unwrap().is_none());
    }

    #[test]
    fn frame_buffer_rejects_oversized_length() {
        let mut header = Vec::new();
        header.extend_from_slice(&1u32.to_le_bytes());
        header.extend_from_slice(&4096u32.to_le_bytes());
        let mut buffer = FrameBuffer::new(1024);
        buffer.extend(&header);
        assert!(matches!(
            buffer.next_frame(),
            Err(DiscordIpcError::ProtocolViolation { .. })
        ));
    }
}
