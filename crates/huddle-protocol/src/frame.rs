//! Length-prefixed framing.
//!
//! Every frame on the wire is a fixed-width header of four ASCII decimal
//! digits (zero padded, `0000`..`9999`) followed by exactly that many
//! payload bytes:
//!
//! ```text
//! ┌──────────┬──────────────────────────┐
//! │  "0005"  │  h  e  l  l  o           │
//! └──────────┴──────────────────────────┘
//!   header      payload (0..=9999 bytes)
//! ```
//!
//! [`FrameCodec`] implements `tokio_util::codec::{Decoder, Encoder}` so a
//! connection can be wrapped in `FramedRead` / `FramedWrite`. The decoder is
//! a small state machine (awaiting header, awaiting body) over the
//! connection's read buffer, so partial reads simply leave the frame pending
//! until the rest arrives. A frame is only ever yielded whole.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, or direct indexing; header access goes
//! through `get()` and `split_to()` after length checks.

use std::io;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Width of the decimal length header in bytes.
pub const HEADER_LEN: usize = 4;

/// Largest payload a 4-digit header can describe.
pub const MAX_FRAME_LEN: usize = 9999;

// ============================================================================
// Errors
// ============================================================================

/// Errors produced while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream ended before a complete header was read.
    #[error("connection closed")]
    Closed,

    /// The stream ended part way through a frame body.
    #[error("frame truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    /// The header is not four decimal digits.
    #[error("invalid frame header: {0:?}")]
    InvalidHeader(String),

    /// The payload does not fit a 4-digit header.
    #[error("frame too long: {len} bytes (max: {MAX_FRAME_LEN})")]
    TooLong { len: usize },

    /// Underlying transport error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Returns true for errors that mean the peer has gone away.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Closed | Self::Truncated { .. } | Self::Io(_))
    }
}

// ============================================================================
// Fixed-width length encoding
// ============================================================================

/// Encodes a payload length as a 4-digit zero-padded decimal header.
///
/// Lengths above [`MAX_FRAME_LEN`] are rejected rather than truncated.
pub fn encode_length(len: usize) -> Result<[u8; HEADER_LEN], FrameError> {
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLong { len });
    }

    let mut header = [b'0'; HEADER_LEN];
    let mut remaining = len;
    for slot in header.iter_mut().rev() {
        // remaining % 10 is always < 10, so the cast cannot truncate
        *slot = b'0' + (remaining % 10) as u8;
        remaining /= 10;
    }
    Ok(header)
}

/// Decodes a 4-digit decimal header into a payload length.
pub fn decode_length(header: &[u8]) -> Result<usize, FrameError> {
    if header.len() != HEADER_LEN || !header.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::InvalidHeader(
            String::from_utf8_lossy(header).into_owned(),
        ));
    }

    Ok(header
        .iter()
        .fold(0usize, |acc, digit| acc * 10 + usize::from(digit - b'0')))
}

/// Encodes a complete frame (header followed by payload).
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let header = encode_length(payload.len())?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    Ok(frame)
}

// ============================================================================
// Codec
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DecodeState {
    #[default]
    Header,
    Body(usize),
}

/// Codec for length-prefixed frames.
///
/// Decoded frames are yielded as raw `Bytes`; interpreting them as text is
/// left to the caller.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    state: DecodeState,
}

impl FrameCodec {
    /// Creates a codec waiting for its first header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        loop {
            match self.state {
                DecodeState::Header => {
                    let Some(header) = src.get(..HEADER_LEN) else {
                        src.reserve(HEADER_LEN.saturating_sub(src.len()));
                        return Ok(None);
                    };
                    let len = decode_length(header)?;
                    let _ = src.split_to(HEADER_LEN);
                    self.state = DecodeState::Body(len);
                }
                DecodeState::Body(len) => {
                    if src.len() < len {
                        src.reserve(len - src.len());
                        return Ok(None);
                    }
                    self.state = DecodeState::Header;
                    return Ok(Some(src.split_to(len).freeze()));
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        match self.state {
            DecodeState::Header if src.is_empty() => Ok(None),
            DecodeState::Header => Err(FrameError::Closed),
            DecodeState::Body(expected) => Err(FrameError::Truncated {
                expected,
                received: src.len(),
            }),
        }
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), FrameError> {
        let payload = item.as_ref();
        let header = encode_length(payload.len())?;
        dst.reserve(HEADER_LEN + payload.len());
        dst.extend_from_slice(&header);
        dst.extend_from_slice(payload);
        Ok(())
    }
}
