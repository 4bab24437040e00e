//! Frame encoding/decoding.
//!
//! Every message on the byte stream is wrapped in a frame:
//!
//! ```text
//! +------+--------+--------+-------------------+
//! | type | len_lo | len_hi | payload[0..len]   |
//! +------+--------+--------+-------------------+
//! ```
//!
//! `type` is `'<'` (0x3c) for app→device and `'>'` (0x3e) for device→app.
//!
//! Resynchronization is heuristic: a byte that is not a frame type, or a
//! header declaring an empty payload, is dropped one byte at a time. There is
//! no checksum, so corrupted bytes that happen to look like a valid header
//! are not detected.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::constants::*;
use crate::error::ProtocolError;

/// Direction marker of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// App to device (`'<'`).
    Outgoing,
    /// Device to app (`'>'`).
    Incoming,
}

impl FrameType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            FRAME_TYPE_OUTGOING => Some(FrameType::Outgoing),
            FRAME_TYPE_INCOMING => Some(FrameType::Incoming),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            FrameType::Outgoing => FRAME_TYPE_OUTGOING,
            FrameType::Incoming => FRAME_TYPE_INCOMING,
        }
    }
}

/// A complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub payload: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Looking for a valid header at the front of the buffer.
    Seeking,
    /// A valid header is at the front; waiting for `len` payload bytes.
    HaveHeader { frame_type: FrameType, len: usize },
}

/// Reassembles frames from an arbitrarily chunked byte stream.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    state: DecodeState,
    dropped: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        FrameDecoder {
            buffer: BytesMut::with_capacity(512),
            state: DecodeState::Seeking,
            dropped: 0,
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                DecodeState::Seeking => {
                    if self.buffer.len() < FRAME_HEADER_SIZE {
                        return None;
                    }

                    let Some(frame_type) = FrameType::from_byte(self.buffer[0]) else {
                        trace!(byte = self.buffer[0], "dropping byte, not a frame type");
                        self.drop_byte();
                        continue;
                    };

                    let len = u16::from_le_bytes([self.buffer[1], self.buffer[2]]) as usize;
                    if len == 0 {
                        trace!("dropping byte, zero-length frame header");
                        self.drop_byte();
                        continue;
                    }

                    self.state = DecodeState::HaveHeader { frame_type, len };
                }

                DecodeState::HaveHeader { frame_type, len } => {
                    if self.buffer.len() < FRAME_HEADER_SIZE + len {
                        return None;
                    }

                    self.buffer.advance(FRAME_HEADER_SIZE);
                    let payload = self.buffer.split_to(len).freeze();
                    self.state = DecodeState::Seeking;
                    return Some(Frame {
                        frame_type,
                        payload,
                    });
                }
            }
        }
    }

    /// Push bytes and collect every frame they complete.
    pub fn decode(&mut self, data: &[u8]) -> Vec<Frame> {
        self.push(data);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    fn drop_byte(&mut self) {
        self.buffer.advance(1);
        self.dropped += 1;
    }

    /// Number of buffered bytes not yet part of an emitted frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes discarded while resynchronizing.
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = DecodeState::Seeking;
    }
}

/// Wrap a payload in a frame of the given type.
pub fn encode_frame(frame_type: FrameType, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(ProtocolError::FrameTooLong {
            max: MAX_FRAME_PAYLOAD,
            actual: payload.len(),
        });
    }
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_u8(frame_type.to_byte());
    buf.put_u16_le(payload.len() as u16);
    buf.put_slice(payload);
    Ok(buf)
}
