//! Command-related type definitions.
//!
//! These builders lower into [`Attribute`] trees; the compiler turns the trees
//! into wire bytes.

use crate::types::{Attribute, Partial};

/// FETCH items to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// Fetch all (equivalent to FLAGS INTERNALDATE RFC822.SIZE ENVELOPE).
    All,
    /// Fetch full (equivalent to FLAGS INTERNALDATE RFC822.SIZE ENVELOPE BODY).
    Full,
    /// Fetch fast (equivalent to FLAGS INTERNALDATE RFC822.SIZE).
    Fast,
    /// Custom list of items.
    Items(Vec<FetchAttribute>),
}

impl FetchItems {
    /// Lowers the items into a single attribute (a list when more than one).
    #[must_use]
    pub fn to_attribute(&self) -> Attribute {
        match self {
            Self::All => Attribute::atom("ALL"),
            Self::Full => Attribute::atom("FULL"),
            Self::Fast => Attribute::atom("FAST"),
            Self::Items(attrs) if attrs.len() == 1 => attrs[0].to_attribute(),
            Self::Items(attrs) => {
                Attribute::List(attrs.iter().map(FetchAttribute::to_attribute).collect())
            }
        }
    }
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// Body structure.
    BodyStructure,
    /// UID.
    Uid,
    /// Body section.
    Body {
        /// Section specifier (`HEADER`, `1.2`, `HEADER.FIELDS (SUBJECT)`).
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
        /// Partial fetch range as (start, length).
        partial: Option<(u64, u64)>,
    },
    /// MODSEQ (CONDSTORE).
    ModSeq,
}

impl FetchAttribute {
    /// Lowers the attribute.
    #[must_use]
    pub fn to_attribute(&self) -> Attribute {
        match self {
            Self::Flags => Attribute::atom("FLAGS"),
            Self::InternalDate => Attribute::atom("INTERNALDATE"),
            Self::Rfc822Size => Attribute::atom("RFC822.SIZE"),
            Self::Envelope => Attribute::atom("ENVELOPE"),
            Self::BodyStructure => Attribute::atom("BODYSTRUCTURE"),
            Self::Uid => Attribute::atom("UID"),
            Self::ModSeq => Attribute::atom("MODSEQ"),
            Self::Body {
                section,
                peek,
                partial,
            } => Attribute::Section {
                name: if *peek { "BODY.PEEK" } else { "BODY" }.to_string(),
                items: section
                    .iter()
                    .map(|s| Attribute::Text(s.clone()))
                    .collect(),
                partial: partial.map(|(start, length)| Partial {
                    start,
                    length: Some(length),
                }),
            },
        }
    }
}

/// STORE action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace flags.
    SetFlags(Vec<String>),
    /// Add flags.
    AddFlags(Vec<String>),
    /// Remove flags.
    RemoveFlags(Vec<String>),
}

impl StoreAction {
    /// Lowers the action to `[(UNCHANGEDSINCE n)] [+|-]FLAGS[.SILENT] (flags)`.
    #[must_use]
    pub fn to_attributes(&self, silent: bool, unchanged_since: Option<u64>) -> Vec<Attribute> {
        let (prefix, flags) = match self {
            Self::SetFlags(f) => ("FLAGS", f),
            Self::AddFlags(f) => ("+FLAGS", f),
            Self::RemoveFlags(f) => ("-FLAGS", f),
        };
        let mut attrs = Vec::with_capacity(3);
        if let Some(modseq) = unchanged_since {
            attrs.push(Attribute::List(vec![
                Attribute::atom("UNCHANGEDSINCE"),
                Attribute::Number(modseq),
            ]));
        }
        attrs.push(Attribute::atom(if silent {
            format!("{prefix}.SILENT")
        } else {
            prefix.to_string()
        }));
        attrs.push(Attribute::List(
            flags.iter().map(|f| Attribute::atom(f.as_str())).collect(),
        ));
        attrs
    }
}

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Messages with \Answered flag.
    Answered,
    /// Messages with \Deleted flag.
    Deleted,
    /// Messages with \Flagged flag.
    Flagged,
    /// Messages without \Deleted flag.
    Undeleted,
    /// Messages without \Seen flag.
    Unseen,
    /// Messages with \Seen flag.
    Seen,
    /// Messages with a keyword.
    Keyword(String),
    /// Sequence number set.
    SequenceSet(String),
    /// UID set.
    Uid(String),
    /// Subject contains text.
    Subject(String),
    /// From contains text.
    From(String),
    /// To contains text.
    To(String),
    /// Body contains text.
    Body(String),
    /// Text in header or body.
    Text(String),
    /// Messages since date (`1-Feb-2024`).
    Since(String),
    /// Messages before date.
    Before(String),
    /// Larger than size.
    Larger(u64),
    /// Smaller than size.
    Smaller(u64),
    /// Header field contains value.
    Header(String, String),
    /// Messages with mod-sequence greater than value (CONDSTORE).
    ModSeq(u64),
    /// AND of criteria.
    And(Vec<Self>),
    /// OR of criteria.
    Or(Box<Self>, Box<Self>),
    /// NOT of criteria.
    Not(Box<Self>),
}

impl SearchCriteria {
    /// Lowers the criteria into search keys.
    #[must_use]
    pub fn to_attributes(&self) -> Vec<Attribute> {
        let key = |name: &str| vec![Attribute::atom(name)];
        let keyed = |name: &str, value: &str| vec![Attribute::atom(name), Attribute::string(value)];
        match self {
            Self::All => key("ALL"),
            Self::Answered => key("ANSWERED"),
            Self::Deleted => key("DELETED"),
            Self::Flagged => key("FLAGGED"),
            Self::Undeleted => key("UNDELETED"),
            Self::Unseen => key("UNSEEN"),
            Self::Seen => key("SEEN"),
            Self::Keyword(k) => vec![Attribute::atom("KEYWORD"), Attribute::atom(k.as_str())],
            Self::SequenceSet(set) => vec![Attribute::sequence(set.as_str())],
            Self::Uid(set) => vec![Attribute::atom("UID"), Attribute::sequence(set.as_str())],
            Self::Subject(s) => keyed("SUBJECT", s.as_str()),
            Self::From(s) => keyed("FROM", s.as_str()),
            Self::To(s) => keyed("TO", s.as_str()),
            Self::Body(s) => keyed("BODY", s.as_str()),
            Self::Text(s) => keyed("TEXT", s.as_str()),
            Self::Since(date) => vec![Attribute::atom("SINCE"), Attribute::atom(date.as_str())],
            Self::Before(date) => vec![Attribute::atom("BEFORE"), Attribute::atom(date.as_str())],
            Self::Larger(n) => vec![Attribute::atom("LARGER"), Attribute::Number(*n)],
            Self::Smaller(n) => vec![Attribute::atom("SMALLER"), Attribute::Number(*n)],
            Self::Header(name, value) => vec![
                Attribute::atom("HEADER"),
                Attribute::string(name.as_str()),
                Attribute::string(value.as_str()),
            ],
            Self::ModSeq(modseq) => vec![Attribute::atom("MODSEQ"), Attribute::Number(*modseq)],
            Self::And(criteria) => criteria.iter().flat_map(Self::to_attributes).collect(),
            Self::Or(a, b) => {
                let mut attrs = vec![Attribute::atom("OR")];
                attrs.push(a.to_grouped());
                attrs.push(b.to_grouped());
                attrs
            }
            Self::Not(c) => vec![Attribute::atom("NOT"), c.to_grouped()],
        }
    }

    /// A single search key; multi-key criteria are parenthesized.
    fn to_grouped(&self) -> Attribute {
        let mut attrs = self.to_attributes();
        if attrs.len() == 1 {
            attrs.remove(0)
        } else {
            Attribute::List(attrs)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::command::compile;
    use crate::types::Request;

    fn wire(attrs: Vec<Attribute>) -> String {
        let chunks = compile(&Request::new("X").attributes(attrs), "W1");
        String::from_utf8(chunks.concat()).unwrap()
    }

    #[test]
    fn test_fetch_items() {
        let items = FetchItems::Items(vec![
            FetchAttribute::Uid,
            FetchAttribute::Flags,
            FetchAttribute::Body {
                section: Some("HEADER.FIELDS (SUBJECT)".to_string()),
                peek: true,
                partial: Some((0, 512)),
            },
        ]);
        assert_eq!(
            wire(vec![items.to_attribute()]),
            "W1 X (UID FLAGS BODY.PEEK[HEADER.FIELDS (SUBJECT)]<0.512>)"
        );
        assert_eq!(wire(vec![FetchItems::Fast.to_attribute()]), "W1 X FAST");
        let single = FetchItems::Items(vec![FetchAttribute::Envelope]);
        assert_eq!(wire(vec![single.to_attribute()]), "W1 X ENVELOPE");
    }

    #[test]
    fn test_store_action() {
        let action = StoreAction::AddFlags(vec!["\\Seen".to_string()]);
        assert_eq!(wire(action.to_attributes(true, None)), "W1 X +FLAGS.SILENT (\\Seen)");
        let action = StoreAction::RemoveFlags(vec!["\\Flagged".to_string()]);
        assert_eq!(
            wire(action.to_attributes(false, Some(12))),
            "W1 X (UNCHANGEDSINCE 12) -FLAGS (\\Flagged)"
        );
    }

    #[test]
    fn test_search_or_not() {
        let criteria = SearchCriteria::Or(
            Box::new(SearchCriteria::Subject("report".to_string())),
            Box::new(SearchCriteria::Not(Box::new(SearchCriteria::Seen))),
        );
        assert_eq!(
            wire(criteria.to_attributes()),
            "W1 X OR (SUBJECT \"report\") (NOT SEEN)"
        );
    }

    #[test]
    fn test_search_and() {
        let criteria = SearchCriteria::And(vec![
            SearchCriteria::Unseen,
            SearchCriteria::Since("1-Feb-2024".to_string()),
            SearchCriteria::Larger(1024),
        ]);
        assert_eq!(
            wire(criteria.to_attributes()),
            "W1 X UNSEEN SINCE 1-Feb-2024 LARGER 1024"
        );
    }
}
