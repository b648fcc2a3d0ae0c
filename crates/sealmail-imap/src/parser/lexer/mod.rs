//! IMAP lexer for tokenizing server responses.
//!
//! Input is one complete frame as produced by the frame decoder: the line
//! ending is already trimmed and literal payloads are inline, directly after
//! their `{n}\r\n` announcement.

#![allow(clippy::missing_errors_doc)]

mod token;

use std::borrow::Cow;

pub use token::Token;

use crate::{Error, Result};

/// IMAP lexer state.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos.min(self.input.len())..]
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Advances by one byte and returns it.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips n bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n).min(self.input.len());
    }

    /// Consumes everything that is left.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let rest = self.remaining();
        self.pos = self.input.len();
        rest
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            // Stray line endings are tolerated as separators.
            b' ' | b'\r' | b'\n' => {
                self.advance();
                Ok(Token::Space)
            }
            b'(' => {
                self.advance();
                Ok(Token::LParen)
            }
            b')' => {
                self.advance();
                Ok(Token::RParen)
            }
            b'[' => {
                self.advance();
                Ok(Token::LBracket)
            }
            b']' => {
                self.advance();
                Ok(Token::RBracket)
            }
            b'"' => self.read_quoted_string(),
            b'{' => self.read_literal(),
            _ if is_atom_char(byte) => Ok(self.read_atom()),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    /// Reads a quoted string token.
    ///
    /// Any escaped byte is taken literally; servers are not consistent about
    /// escaping only `"` and `\`.
    fn read_quoted_string(&mut self) -> Result<Token<'a>> {
        self.advance();

        let mut result = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c) => result.push(c),
                    None => return Err(self.error("Unexpected end of quoted string")),
                },
                Some(c) => result.push(c),
                None => return Err(self.error("Unexpected end of quoted string")),
            }
        }

        Ok(Token::QuotedString(
            String::from_utf8_lossy(&result).into_owned(),
        ))
    }

    /// Reads a literal: `{n}` (or `{n+}`), CRLF, then `n` payload bytes.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.advance();

        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
        let digits = &self.input[start..self.pos];
        if self.peek() == Some(b'+') {
            self.advance();
        }
        if self.advance() != Some(b'}') {
            return Err(self.error("Expected } after literal size"));
        }

        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("Invalid literal size"))?;

        if self.peek() == Some(b'\r') {
            self.advance();
        }
        if self.advance() != Some(b'\n') {
            return Err(self.error("Expected CRLF after literal size"));
        }

        let end = self
            .pos
            .checked_add(size)
            .filter(|end| *end <= self.input.len())
            .ok_or_else(|| self.error("Incomplete literal data"))?;
        let data = &self.input[self.pos..end];
        self.pos = end;

        Ok(Token::Literal(data))
    }

    /// Reads an atom token.
    fn read_atom(&mut self) -> Token<'a> {
        let start = self.pos;
        while self.peek().is_some_and(is_atom_char) {
            self.advance();
        }

        let s = String::from_utf8_lossy(&self.input[start..self.pos]);
        if s.eq_ignore_ascii_case("NIL") {
            Token::Nil
        } else {
            Token::Atom(s)
        }
    }

    /// Reads an atom up to (not including) `stop`, accepting any byte but
    /// line endings. Used for `<start.length>` partial ranges.
    pub fn read_until(&mut self, stop: u8) -> Result<Cow<'a, str>> {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b) if b == stop => break,
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error(&format!("Expected {:?}", char::from(stop))));
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let s = String::from_utf8_lossy(&self.input[start..self.pos]);
        self.advance();
        Ok(s)
    }

    /// Skips optional spaces.
    pub fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\r' | b'\n')) {
            self.advance();
        }
    }

    /// Creates a parse error at the current position.
    pub fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }
}

/// Returns true if the byte may appear in an atom.
///
/// Atoms here are any byte except SP, `(`, `)`, `{`, `"`, `[`, `]` and
/// control characters. `\`, `*` and `%` are allowed so flags like `\Seen`
/// and sequence sets like `1:*` stay single tokens; 8-bit bytes are allowed
/// for servers that send raw UTF-8.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    !matches!(b, b'(' | b')' | b'{' | b' ' | b'"' | b'[' | b']') && b > 0x1F && b != 0x7F
}
