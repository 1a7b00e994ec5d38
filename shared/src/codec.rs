//! Length-prefixed framing shared by both directions of a connection.
//!
//! A frame is a 4-byte big-endian length followed by that many payload bytes.
//! [`FrameDecoder`] accepts bytes in whatever chunks the transport delivers
//! them and hands out at most one complete frame per call, keeping any
//! surplus bytes buffered for the next one.

use crate::{ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the big-endian length prefix in front of every frame.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest payload a peer may announce before the connection is dropped.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Where the decoder currently is within the frame being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Fewer than [`LENGTH_PREFIX_LEN`] bytes of the prefix are buffered.
    ReadingLength,
    /// The length is known but the body is still incomplete.
    ReadingBody { expected: usize },
    /// A whole frame is buffered and can be taken with [`FrameDecoder::next_frame`].
    FrameReady { expected: usize },
}

/// Prepends the length prefix to `payload`.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.to_vec()
}

/// Incremental decoder for length-prefixed frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Body length of the current frame, `None` until the prefix is complete.
    expected: Option<usize>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            expected: None,
        }
    }

    /// Appends freshly read bytes.
    ///
    /// Fails once a length prefix larger than [`MAX_FRAME_LEN`] becomes
    /// readable, so a bogus prefix is caught before its body is buffered.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(bytes);
        self.read_length()?;
        Ok(())
    }

    pub fn state(&self) -> DecodeState {
        match self.expected {
            None => DecodeState::ReadingLength,
            Some(expected) if self.buffer.len() >= expected => DecodeState::FrameReady { expected },
            Some(expected) => DecodeState::ReadingBody { expected },
        }
    }

    /// Announced length of the frame in progress, 0 while the prefix is incomplete.
    pub fn expected_len(&self) -> usize {
        self.expected.unwrap_or(0)
    }

    /// Bytes held that do not belong to an already consumed prefix.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Removes and returns exactly one complete frame body, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        let Some(expected) = self.read_length()? else {
            return Ok(None);
        };
        if self.buffer.len() < expected {
            return Ok(None);
        }

        let frame = self.buffer.split_to(expected).freeze();
        self.expected = None;
        // Bytes of the following frame may already be waiting.
        self.read_length()?;
        Ok(Some(frame))
    }

    /// Like [`next_frame`](Self::next_frame) but decodes the body as UTF-8.
    pub fn next_text(&mut self) -> Result<Option<String>> {
        match self.next_frame()? {
            Some(frame) => Ok(Some(String::from_utf8(frame.to_vec())?)),
            None => Ok(None),
        }
    }

    /// Drops buffered bytes and any partially read prefix.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.expected = None;
    }

    fn read_length(&mut self) -> Result<Option<usize>> {
        if self.expected.is_none() && self.buffer.len() >= LENGTH_PREFIX_LEN {
            let len = self.buffer.get_u32() as usize;
            if len > MAX_FRAME_LEN {
                return Err(ProtocolError::FrameTooLarge(len));
            }
            self.expected = Some(len);
        }
        Ok(self.expected)
    }
}
