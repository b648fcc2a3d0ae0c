//! Attribute trees shared by requests and responses.

use bytes::Bytes;

/// Partial range of a body section (`<start.length>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partial {
    /// First octet.
    pub start: u64,
    /// Number of octets, if given.
    pub length: Option<u64>,
}

/// A node of an IMAP attribute tree.
///
/// Requests are built from these nodes and compiled to wire bytes; responses
/// are parsed back into them. The core only inspects a handful of shapes
/// (leading atoms, bracketed response codes, trailing text), everything else
/// is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// Bare atom (`FLAGS`, `\Seen`, `EXISTS`, `123`).
    Atom(String),
    /// Quoted string, or a literal when the value can't be quoted.
    String(String),
    /// Length-prefixed literal.
    Literal(Bytes),
    /// Number.
    Number(u64),
    /// Sequence set, written verbatim (`1:*`, `4,7:9`).
    Sequence(String),
    /// Free text, written verbatim. In responses: the human-readable tail.
    Text(String),
    /// Raw text sent only after the server asks for more with `+`.
    Chunk(String),
    /// Parenthesized list.
    List(Vec<Attribute>),
    /// Atom with a bracketed section, e.g. `BODY.PEEK[HEADER]<0.512>`.
    ///
    /// Response codes (`[CAPABILITY ...]`, `[UIDVALIDITY 3]`) are parsed as a
    /// section with an empty name.
    Section {
        /// Atom before the bracket; empty for response codes.
        name: String,
        /// Section contents.
        items: Vec<Attribute>,
        /// Optional `<start.length>` suffix.
        partial: Option<Partial>,
    },
    /// NIL.
    Nil,
}

impl Attribute {
    /// Creates an atom.
    pub fn atom(value: impl Into<String>) -> Self {
        Self::Atom(value.into())
    }

    /// Creates a string.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Creates a literal.
    pub fn literal(value: impl Into<Bytes>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a sequence set.
    pub fn sequence(value: impl Into<String>) -> Self {
        Self::Sequence(value.into())
    }

    /// Creates a section such as `BODY.PEEK[]`.
    pub fn section(name: impl Into<String>, items: Vec<Self>) -> Self {
        Self::Section {
            name: name.into(),
            items,
            partial: None,
        }
    }

    /// Returns the textual value of scalar nodes.
    ///
    /// Literals are decoded lossily as UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<std::borrow::Cow<'_, str>> {
        use std::borrow::Cow;
        match self {
            Self::Atom(s) | Self::String(s) | Self::Sequence(s) | Self::Text(s) | Self::Chunk(s) => {
                Some(Cow::Borrowed(s.as_str()))
            }
            Self::Literal(b) => Some(String::from_utf8_lossy(b)),
            Self::Number(n) => Some(Cow::Owned(n.to_string())),
            Self::Section { name, .. } => Some(Cow::Borrowed(name.as_str())),
            Self::List(_) | Self::Nil => None,
        }
    }

    /// Returns the raw bytes of string-like nodes.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Atom(s) | Self::String(s) | Self::Sequence(s) | Self::Text(s) | Self::Chunk(s) => {
                Some(s.as_bytes())
            }
            Self::Literal(b) => Some(b),
            _ => None,
        }
    }

    /// Interprets the node as a number (numeric atoms included).
    #[must_use]
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Atom(s) | Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the children of a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` for atoms.
    #[must_use]
    pub const fn is_atom(&self) -> bool {
        matches!(self, Self::Atom(_))
    }

    /// Returns `true` for literals and chunks, the nodes that split a command
    /// into several transmissions.
    #[must_use]
    pub const fn needs_continuation(&self) -> bool {
        matches!(self, Self::Literal(_) | Self::Chunk(_))
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Self::Atom(value.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_as_number() {
        assert_eq!(Attribute::atom("42").as_number(), Some(42));
        assert_eq!(Attribute::Number(7).as_number(), Some(7));
        assert_eq!(Attribute::atom("FLAGS").as_number(), None);
        assert_eq!(Attribute::Nil.as_number(), None);
    }

    #[test]
    fn test_as_str() {
        assert_eq!(Attribute::string("INBOX").as_str().unwrap(), "INBOX");
        assert_eq!(
            Attribute::literal(&b"hello"[..]).as_str().unwrap(),
            "hello"
        );
        assert!(Attribute::List(vec![]).as_str().is_none());
    }
}
