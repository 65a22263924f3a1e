//! Delimiter-based line framing.
//!
//! `LineCodec` splits an inbound byte stream into UTF-8 lines separated by
//! a configurable (possibly multi-byte) delimiter and appends the same
//! delimiter to every outbound line. The delimiter is never escaped.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()` or direct indexing; all slicing goes through
//! `BytesMut::split_to` / `truncate` with checked lengths.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Default line delimiter (CRLF).
pub const DEFAULT_DELIMITER: &[u8] = b"\r\n";

/// Default maximum length of a single inbound line, delimiter excluded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16_384;

/// Errors produced while framing lines.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Line too long: {len} bytes (max: {max})")]
    LineTooLong { len: usize, max: usize },

    #[error("Line is not valid UTF-8")]
    InvalidUtf8,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Line codec with a configurable delimiter and maximum line length.
#[derive(Debug, Clone)]
pub struct LineCodec {
    delimiter: Vec<u8>,
    max_length: usize,
    /// Offset into the buffer where the next delimiter search starts.
    next_index: usize,
}

impl LineCodec {
    /// Creates a codec using `\r\n` and the default maximum line length.
    pub fn new() -> Self {
        Self::with_delimiter(DEFAULT_DELIMITER, DEFAULT_MAX_LINE_LENGTH)
    }

    /// Creates a codec with a custom delimiter and maximum line length.
    ///
    /// An empty delimiter falls back to `\r\n`; callers are expected to
    /// validate configuration before reaching this point.
    pub fn with_delimiter(delimiter: impl Into<Vec<u8>>, max_length: usize) -> Self {
        let mut delimiter = delimiter.into();
        if delimiter.is_empty() {
            delimiter = DEFAULT_DELIMITER.to_vec();
        }
        Self {
            delimiter,
            max_length,
            next_index: 0,
        }
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    fn find_delimiter(&self, buf: &[u8]) -> Option<usize> {
        let start = self.next_index.min(buf.len());
        buf.get(start..)?
            .windows(self.delimiter.len())
            .position(|window| window == self.delimiter.as_slice())
            .map(|pos| start + pos)
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
        match self.find_delimiter(buf) {
            Some(pos) => {
                self.next_index = 0;

                if pos > self.max_length {
                    return Err(CodecError::LineTooLong {
                        len: pos,
                        max: self.max_length,
                    });
                }

                let line = buf.split_to(pos);
                buf.advance(self.delimiter.len());
                let line =
                    String::from_utf8(line.to_vec()).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Some(line))
            }
            None => {
                if buf.len() > self.max_length + self.delimiter.len() {
                    return Err(CodecError::LineTooLong {
                        len: buf.len(),
                        max: self.max_length,
                    });
                }

                // A delimiter may straddle the boundary of the next read.
                self.next_index = buf.len().saturating_sub(self.delimiter.len() - 1);
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, CodecError> {
        match self.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None => {
                // Trailing bytes without a delimiter are not a line.
                buf.clear();
                self.next_index = 0;
                Ok(None)
            }
        }
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), CodecError> {
        let line = line.as_ref();
        buf.reserve(line.len() + self.delimiter.len());
        buf.put(line.as_bytes());
        buf.put(self.delimiter.as_slice());
        Ok(())
    }
}
