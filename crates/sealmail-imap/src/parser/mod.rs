//! IMAP response parser.
//!
//! Frames are parsed into a generic attribute tree rather than typed
//! structures: `tag SP verb [SP attributes]`. Status responses (`OK`, `NO`,
//! `BAD`, `BYE`, `PREAUTH`) are special-cased so that the free-form text after
//! the optional response code is kept as a single [`Attribute::Text`].
//!
//! # Example
//!
//! ```
//! use sealmail_imap::parser::{parse, ParseOptions};
//!
//! let response = parse(b"* 3 EXISTS", ParseOptions::default()).unwrap();
//! assert_eq!(response.command, "EXISTS");
//! assert_eq!(response.nr, Some(3));
//! ```

pub mod lexer;

use bytes::Bytes;

pub use lexer::{Lexer, Token};

use crate::types::{Attribute, Partial, Response};
use crate::Result;

/// Parser options taken from the command the response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Decode literals as (lossy UTF-8) strings instead of raw bytes.
    pub value_as_string: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            value_as_string: true,
        }
    }
}

const STATUS_VERBS: [&str; 5] = ["OK", "NO", "BAD", "BYE", "PREAUTH"];

/// Deepest list or section nesting accepted in one frame.
const MAX_NESTING: usize = 64;

/// Parses one frame into a normalized [`Response`].
///
/// # Errors
///
/// Returns [`crate::Error::Parse`] if the frame is not a well-formed response.
pub fn parse(frame: &[u8], options: ParseOptions) -> Result<Response> {
    let mut parser = Parser {
        lexer: Lexer::new(frame),
        options,
    };
    let mut response = parser.response()?;
    response.normalize();
    Ok(response)
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    options: ParseOptions,
}

impl Parser<'_> {
    fn response(&mut self) -> Result<Response> {
        let tag = match self.lexer.next_token()? {
            Token::Atom(tag) => tag.into_owned(),
            token => return Err(self.lexer.error(&format!("Expected tag, got {token:?}"))),
        };
        self.lexer.skip_spaces();

        let command = match self.lexer.next_token()? {
            Token::Atom(command) => command.into_owned(),
            Token::Eof => {
                return Err(self.lexer.error("Missing command"));
            }
            token => {
                return Err(self
                    .lexer
                    .error(&format!("Expected command, got {token:?}")));
            }
        };
        self.lexer.skip_spaces();

        let attributes = if STATUS_VERBS.contains(&command.to_uppercase().as_str()) {
            self.status_attributes()?
        } else {
            self.attributes(None, 0)?
        };

        Ok(Response {
            tag,
            command,
            attributes,
            ..Response::default()
        })
    }

    /// `[code values...] human readable text`
    fn status_attributes(&mut self) -> Result<Vec<Attribute>> {
        let mut attributes = Vec::new();
        if self.lexer.peek() == Some(b'[') {
            self.lexer.advance();
            let items = self.attributes(Some(Token::RBracket), 1)?;
            attributes.push(Attribute::section("", items));
            self.lexer.skip_spaces();
        }
        let text = self.lexer.take_rest();
        if !text.is_empty() {
            attributes.push(Attribute::Text(
                String::from_utf8_lossy(text).trim_end().to_string(),
            ));
        }
        Ok(attributes)
    }

    /// Parses attributes until `close` (or end of input when `None`).
    ///
    /// `depth` counts the enclosing lists and sections.
    fn attributes(
        &mut self,
        close: Option<Token<'static>>,
        depth: usize,
    ) -> Result<Vec<Attribute>> {
        if depth > MAX_NESTING {
            return Err(self.lexer.error("nesting too deep"));
        }
        let mut items = Vec::new();
        loop {
            let token = self.lexer.next_token()?;
            match token {
                Token::Space => {}
                Token::Eof => {
                    return match close {
                        None => Ok(items),
                        Some(close) => Err(self
                            .lexer
                            .error(&format!("Unexpected end of input, expected {close:?}"))),
                    };
                }
                Token::RParen | Token::RBracket if close.as_ref() == Some(&token) => {
                    return Ok(items);
                }
                Token::RParen | Token::RBracket => {
                    return Err(self.lexer.error(&format!("Unbalanced {token:?}")));
                }
                Token::LParen => {
                    items.push(Attribute::List(self.attributes(Some(Token::RParen), depth + 1)?));
                }
                Token::LBracket => {
                    let inner = self.attributes(Some(Token::RBracket), depth + 1)?;
                    items.push(Attribute::section("", inner));
                }
                Token::QuotedString(s) => items.push(Attribute::String(s)),
                Token::Literal(data) => items.push(if self.options.value_as_string {
                    Attribute::String(String::from_utf8_lossy(data).into_owned())
                } else {
                    Attribute::Literal(Bytes::copy_from_slice(data))
                }),
                Token::Nil => items.push(Attribute::Nil),
                Token::Atom(name) => {
                    let name = name.into_owned();
                    if self.lexer.peek() == Some(b'[') {
                        self.lexer.advance();
                        let section = self.attributes(Some(Token::RBracket), depth + 1)?;
                        let partial = self.partial()?;
                        items.push(Attribute::Section {
                            name,
                            items: section,
                            partial,
                        });
                    } else {
                        items.push(Attribute::Atom(name));
                    }
                }
            }
        }
    }

    /// Optional `<start>` or `<start.length>` right after a section.
    fn partial(&mut self) -> Result<Option<Partial>> {
        if self.lexer.peek() != Some(b'<') {
            return Ok(None);
        }
        self.lexer.advance();
        let range = self.lexer.read_until(b'>')?;
        let mut parts = range.splitn(2, '.');
        let start = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.lexer.error("Invalid partial range"))?;
        let length = match parts.next() {
            Some(len) => Some(
                len.parse()
                    .map_err(|_| self.lexer.error("Invalid partial length"))?,
            ),
            None => None,
        };
        Ok(Some(Partial { start, length }))
    }
}
