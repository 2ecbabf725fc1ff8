//! API frame encoding and decoding.
//!
//! The wire format is:
//! ```text
//! ┌──────────┬──────────────┬─────────────────────────┬──────────┐
//! │  0x7e    │  length (BE) │ frame data              │ checksum │
//! │  1 byte  │   2 bytes    │ identifier + cmdData    │  1 byte  │
//! └──────────┴──────────────┴─────────────────────────┴──────────┘
//! ```
//!
//! In escaped API mode (AP=2) every byte after the start delimiter that is
//! one of `0x7e`, `0x7d`, `0x11`, `0x13` is sent as `0x7d` followed by the
//! byte XOR `0x20`. Length and checksum always cover the unescaped data.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Frame start delimiter.
pub const START_DELIMITER: u8 = 0x7e;

/// Escape marker used in API mode 2.
pub const ESCAPE: u8 = 0x7d;

/// Software flow control XON.
pub const XON: u8 = 0x11;

/// Software flow control XOFF.
pub const XOFF: u8 = 0x13;

/// Value XORed into an escaped byte.
pub const ESCAPE_XOR: u8 = 0x20;

/// Maximum frame data size.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// Minimum frame size (delimiter + length + identifier + checksum).
pub const MIN_FRAME_SIZE: usize = 5;

/// The module's API mode (`ATAP`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ApiMode {
    /// `AP=1`: frames are sent as-is.
    Unescaped,
    /// `AP=2`: control bytes are escaped.
    #[default]
    Escaped,
}

impl ApiMode {
    const fn escapes(self, byte: u8) -> bool {
        matches!(self, Self::Escaped)
            && matches!(byte, START_DELIMITER | ESCAPE | XON | XOFF)
    }
}

/// Computes the checksum of unescaped frame data.
#[must_use]
pub fn checksum(data: &[u8]) -> u8 {
    0xff - data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn put_byte(buf: &mut BytesMut, byte: u8, mode: ApiMode) {
    if mode.escapes(byte) {
        buf.put_u8(ESCAPE);
        buf.put_u8(byte ^ ESCAPE_XOR);
    } else {
        buf.put_u8(byte);
    }
}

/// Encodes frame data (identifier first) into a complete API frame.
///
/// # Errors
///
/// Returns a `FrameError` if the payload is empty or exceeds `MAX_FRAME_SIZE`.
pub fn encode(payload: &[u8], mode: ApiMode) -> Result<Bytes, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }
    let length = u16::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        size: payload.len(),
        max: MAX_FRAME_SIZE,
    })?;

    let mut buf = BytesMut::with_capacity(MIN_FRAME_SIZE + payload.len() * 2);
    buf.put_u8(START_DELIMITER);
    for byte in length.to_be_bytes() {
        put_byte(&mut buf, byte, mode);
    }
    for &byte in payload {
        put_byte(&mut buf, byte, mode);
    }
    put_byte(&mut buf, checksum(payload), mode);
    Ok(buf.freeze())
}

/// Frame decoder that handles partial data.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    mode: ApiMode,
}

impl FrameDecoder {
    /// Creates a new frame decoder for the given API mode.
    #[must_use]
    pub fn new(mode: ApiMode) -> Self {
        Self {
            buffer: BytesMut::new(),
            mode,
        }
    }

    /// Returns the API mode this decoder expects.
    #[must_use]
    pub const fn mode(&self) -> ApiMode {
        self.mode
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame.
    ///
    /// Returns `Ok(Some(data))` with the unescaped frame data (identifier
    /// first) if a complete frame was decoded, `Ok(None)` if more bytes are
    /// needed, or an error if a frame had to be dropped. Errors always
    /// consume input, so calling again makes progress.
    pub fn decode(&mut self) -> Result<Option<Bytes>, FrameError> {
        match self.buffer.iter().position(|&b| b == START_DELIMITER) {
            Some(0) => {}
            Some(skip) => {
                tracing::trace!("discarding {} bytes before start delimiter", skip);
                self.buffer.advance(skip);
            }
            None => {
                if !self.buffer.is_empty() {
                    tracing::trace!("discarding {} bytes without delimiter", self.buffer.len());
                }
                self.buffer.clear();
                return Ok(None);
            }
        }

        // length (2) + frame data + checksum (1), unescaped
        let mut unescaped = Vec::new();
        let mut needed = 2;
        let mut pos = 1;

        while unescaped.len() < needed {
            let Some(&byte) = self.buffer.get(pos) else {
                return Ok(None);
            };

            let byte = if self.mode == ApiMode::Escaped {
                if byte == START_DELIMITER {
                    self.buffer.advance(pos);
                    return Err(FrameError::Truncated {
                        got: unescaped.len(),
                    });
                }
                if byte == ESCAPE {
                    let Some(&next) = self.buffer.get(pos + 1) else {
                        return Ok(None);
                    };
                    if next == START_DELIMITER {
                        self.buffer.advance(pos + 1);
                        return Err(FrameError::Truncated {
                            got: unescaped.len(),
                        });
                    }
                    pos += 2;
                    next ^ ESCAPE_XOR
                } else {
                    pos += 1;
                    byte
                }
            } else {
                pos += 1;
                byte
            };

            unescaped.push(byte);

            if unescaped.len() == 2 && needed == 2 {
                let length = usize::from(u16::from_be_bytes([unescaped[0], unescaped[1]]));
                if length == 0 {
                    self.buffer.advance(pos);
                    return Err(FrameError::Empty);
                }
                needed = 2 + length + 1;
            }
        }

        self.buffer.advance(pos);

        let data = &unescaped[2..needed - 1];
        let got = unescaped[needed - 1];
        let expected = checksum(data);
        if got != expected {
            return Err(FrameError::ChecksumMismatch { expected, got });
        }

        Ok(Some(Bytes::copy_from_slice(data)))
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
