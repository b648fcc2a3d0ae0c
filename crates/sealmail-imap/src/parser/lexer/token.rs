//! IMAP token types.

use std::borrow::Cow;

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom (unquoted string without special characters). Numbers, `*` and
    /// `\Seen`-style flags are atoms too.
    Atom(Cow<'a, str>),
    /// Quoted string, unescaped.
    QuotedString(String),
    /// Literal payload following a `{n}` announcement.
    Literal(&'a [u8]),
    /// Opening parenthesis.
    LParen,
    /// Closing parenthesis.
    RParen,
    /// Opening bracket.
    LBracket,
    /// Closing bracket.
    RBracket,
    /// Space character.
    Space,
    /// NIL.
    Nil,
    /// End of input.
    Eof,
}
