//! Frame buffer for accumulating partial reads.
//!
//! Stream transports carry one encoded message per frame:
//!
//! ```text
//! ┌──────────┬─────────────────────┐
//! │ Length   │ Encoded message     │
//! │ 4 bytes  │ Length bytes        │
//! │ uint32 BE│                     │
//! └──────────┴─────────────────────┘
//! ```
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management and a small state
//! machine for fragmented frames:
//! - `WaitingForLength`: Need at least 4 bytes
//! - `WaitingForPayload`: Length parsed, need N more bytes
//!
//! # Example
//!
//! ```
//! use progwire::protocol::{encode_frame, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let frame = encode_frame(b"{\"hello\":\"world\"}");
//!
//! assert!(buffer.push(&frame[..3]).unwrap().is_empty());
//! let payloads = buffer.push(&frame[3..]).unwrap();
//! assert_eq!(&payloads[0][..], b"{\"hello\":\"world\"}");
//! ```

use bytes::{Bytes, BytesMut};

use crate::error::{ChannelError, Result};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum message size (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Build a complete frame (length prefix + payload).
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&encode_length(payload.len()));
    frame.extend_from_slice(payload);
    frame
}

/// Encode a payload length as a big endian prefix.
///
/// `len` must fit in a `u32`. The stream transport rejects larger
/// payloads before framing them.
#[inline]
pub fn encode_length(len: usize) -> [u8; LENGTH_PREFIX_SIZE] {
    debug_assert!(u32::try_from(len).is_ok(), "frame length {} overflows u32", len);
    (len as u32).to_be_bytes()
}

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for the complete length prefix.
    WaitingForLength,
    /// Length parsed, waiting for payload bytes.
    WaitingForPayload { remaining: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from stream reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_message_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64KB, max message: 16MB.
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a new frame buffer with a custom message size limit.
    pub fn with_max_message_size(max_message_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForLength,
            max_message_size,
        }
    }

    /// Push data into the buffer and extract all complete payloads.
    ///
    /// Partial data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::MessageTooLarge`] if a frame announces a
    /// payload above the limit.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut payloads = Vec::new();
        while let Some(payload) = self.try_extract_one()? {
            payloads.push(payload);
        }

        Ok(payloads)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.state {
                State::WaitingForLength => {
                    if self.buffer.len() < LENGTH_PREFIX_SIZE {
                        return Ok(None);
                    }

                    let prefix = self.buffer.split_to(LENGTH_PREFIX_SIZE);
                    let size = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);

                    if size > self.max_message_size {
                        return Err(ChannelError::MessageTooLarge {
                            size,
                            max: self.max_message_size,
                        });
                    }

                    self.state = State::WaitingForPayload { remaining: size };
                }

                State::WaitingForPayload { remaining } => {
                    let remaining = remaining as usize;
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let payload = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForLength;
                    return Ok(Some(payload));
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForLength => "WaitingForLength",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
