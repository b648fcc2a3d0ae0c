//! Frame reconstruction for IMAP responses.
//!
//! IMAP uses CRLF-terminated lines with support for literals: a line ending
//! in `{n}` is followed by exactly `n` bytes of opaque data (which may contain
//! CRLF) and then the rest of the line. [`FrameDecoder`] turns arbitrarily
//! chunked input into complete frames with the final line ending trimmed and
//! literal payloads left inline.

#![allow(clippy::missing_errors_doc)]

use bytes::{Bytes, BytesMut};

use crate::{Error, Result};

/// Default buffer size for reading.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length (outside literals) to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum literal size to prevent memory exhaustion.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Scanning for `{` or LF.
    Default,
    /// Inside `{...`, accumulating digits.
    LiteralLength { length: usize, digits: usize },
    /// Saw `{n}`, expecting CR.
    LiteralLengthEnd(usize),
    /// Consuming literal bytes blindly (CRLF after the announcement included).
    Literal(usize),
}

/// Resumable decoder from byte chunks to response frames.
///
/// The internal buffer always holds exactly the bytes received but not yet
/// yielded as part of a frame.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Bytes of `buffer` already examined.
    scanned: usize,
    /// Bytes of the current frame scanned outside literals.
    line_length: usize,
    state: State,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            scanned: 0,
            line_length: 0,
            state: State::Default,
        }
    }

    /// Number of buffered bytes not yet yielded.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feeds a chunk and returns every frame it completes, in order.
    ///
    /// Empty lines are swallowed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>> {
        self.push(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Appends a chunk without decoding it.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Decodes the next complete frame from the buffered bytes, if any.
    ///
    /// Lets the caller stop between frames and take the rest of the buffer,
    /// e.g. when the byte stream changes encoding after STARTTLS or COMPRESS.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        while self.scanned < self.buffer.len() {
            if let State::Literal(remaining) = self.state {
                let take = remaining.min(self.buffer.len() - self.scanned);
                self.scanned += take;
                self.state = match remaining - take {
                    0 => State::Default,
                    left => State::Literal(left),
                };
                continue;
            }

            let byte = self.buffer[self.scanned];
            match self.state {
                State::Default => match byte {
                    b'{' => {
                        self.state = State::LiteralLength {
                            length: 0,
                            digits: 0,
                        };
                        self.advance()?;
                    }
                    b'\n' => {
                        if let Some(frame) = self.split_frame() {
                            return Ok(Some(frame));
                        }
                    }
                    _ => self.advance()?,
                },
                State::LiteralLength { length, digits } => match byte {
                    b'0'..=b'9' => {
                        let length = length
                            .checked_mul(10)
                            .and_then(|n| n.checked_add(usize::from(byte - b'0')))
                            .filter(|n| *n <= MAX_LITERAL_SIZE)
                            .ok_or_else(|| {
                                Error::Protocol(format!(
                                    "literal too large (max {MAX_LITERAL_SIZE} bytes)"
                                ))
                            })?;
                        self.state = State::LiteralLength {
                            length,
                            digits: digits + 1,
                        };
                        self.advance()?;
                    }
                    b'}' if digits > 0 => {
                        self.state = State::LiteralLengthEnd(length);
                        self.advance()?;
                    }
                    // Not a literal header after all; re-examine as data.
                    _ => self.state = State::Default,
                },
                State::LiteralLengthEnd(length) => {
                    if byte == b'\r' {
                        self.state = State::Literal(length + 2);
                    } else {
                        self.state = State::Default;
                    }
                }
                State::Literal(_) => {}
            }
        }

        Ok(None)
    }

    /// Removes and returns every byte not yet yielded, resetting the decoder.
    pub fn take_buffered(&mut self) -> Bytes {
        self.scanned = 0;
        self.line_length = 0;
        self.state = State::Default;
        self.buffer.split().freeze()
    }

    /// Steps over one non-literal byte.
    fn advance(&mut self) -> Result<()> {
        self.scanned += 1;
        self.line_length += 1;
        if self.line_length > MAX_LINE_LENGTH {
            return Err(Error::Protocol(format!(
                "line too long (max {MAX_LINE_LENGTH} bytes)"
            )));
        }
        Ok(())
    }

    /// Splits off the frame ending at the LF under the cursor.
    fn split_frame(&mut self) -> Option<Bytes> {
        let mut frame = self.buffer.split_to(self.scanned + 1);
        self.scanned = 0;
        self.line_length = 0;

        frame.truncate(frame.len() - 1);
        if frame.last() == Some(&b'\r') {
            frame.truncate(frame.len() - 1);
        }
        if frame.is_empty() {
            return None;
        }
        Some(frame.freeze())
    }
}
