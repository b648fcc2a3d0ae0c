//! Parsed server responses.

use std::collections::HashMap;

use super::Attribute;
use crate::{Error, Result};

/// Value attached to a bracketed response code, keyed by the lower-cased
/// code name (`[UIDVALIDITY 3]` → `uidvalidity = Scalar("3")`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeValue {
    /// Exactly one value followed the code.
    Scalar(String),
    /// Several values followed the code.
    List(Vec<String>),
}

impl CodeValue {
    /// Returns the scalar value.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }
}

/// A parsed and normalized IMAP response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// `*` for untagged data, or the tag of the command it completes.
    pub tag: String,
    /// Upper-cased verb (`OK`, `FETCH`, `EXISTS`, ...).
    pub command: String,
    /// Remaining arguments.
    pub attributes: Vec<Attribute>,
    /// Message number of `* <n> VERB` responses.
    pub nr: Option<u32>,
    /// Trailing text of status responses.
    pub human_readable: Option<String>,
    /// Bracketed response code name.
    pub code: Option<String>,
    /// Capability list carried by a `[CAPABILITY ...]` code.
    pub capability: Option<Vec<String>>,
    /// Values of the bracketed response code.
    pub extra: HashMap<String, CodeValue>,
    /// Untagged responses collected while the command was in flight.
    pub payload: HashMap<String, Vec<Response>>,
}

const STATUS_VERBS: [&str; 5] = ["OK", "NO", "BAD", "BYE", "PREAUTH"];

impl Response {
    /// Returns `true` for untagged responses.
    #[must_use]
    pub fn is_untagged(&self) -> bool {
        self.tag == "*"
    }

    /// Returns the collected untagged responses of a verb.
    #[must_use]
    pub fn payload(&self, verb: &str) -> &[Self] {
        self.payload.get(verb).map_or(&[], Vec::as_slice)
    }

    /// Normalizes a freshly parsed response.
    ///
    /// `* 3 EXISTS` is parsed as verb `3` with a leading `EXISTS` atom; it
    /// becomes verb `EXISTS` with `nr = 3`. Status responses get their text
    /// and bracketed response code lifted into named fields.
    pub fn normalize(&mut self) {
        self.command = self.command.trim().to_uppercase();
        if self.attributes.is_empty() {
            return;
        }

        if self.is_untagged()
            && !self.command.is_empty()
            && self.command.bytes().all(|b| b.is_ascii_digit())
            && self.attributes[0].is_atom()
        {
            self.nr = self.command.parse().ok();
            if let Attribute::Atom(verb) = self.attributes.remove(0) {
                self.command = verb.trim().to_uppercase();
            }
        }

        if !STATUS_VERBS.contains(&self.command.as_str()) {
            return;
        }

        if let Some(Attribute::Text(text)) = self.attributes.last() {
            self.human_readable = Some(text.clone());
        }

        let Some(Attribute::Section { name, items, .. }) = self.attributes.first() else {
            return;
        };
        if !name.is_empty() {
            return;
        }
        let mut items = items.iter();
        let Some(code) = items.next().and_then(Attribute::as_str) else {
            return;
        };
        let code = code.trim().to_uppercase();

        let values: Vec<CodeValue> = items.filter_map(code_value).collect();
        if code == "CAPABILITY" {
            self.capability = Some(
                values
                    .iter()
                    .flat_map(|v| match v {
                        CodeValue::Scalar(s) => vec![s.to_uppercase()],
                        CodeValue::List(l) => l.iter().map(|s| s.to_uppercase()).collect(),
                    })
                    .collect(),
            );
        }
        match values.len() {
            0 => {}
            1 => {
                if let Some(value) = values.into_iter().next() {
                    self.extra.insert(code.to_lowercase(), value);
                }
            }
            _ => {
                let flat = values
                    .into_iter()
                    .flat_map(|v| match v {
                        CodeValue::Scalar(s) => vec![s],
                        CodeValue::List(l) => l,
                    })
                    .collect();
                self.extra.insert(code.to_lowercase(), CodeValue::List(flat));
            }
        }
        self.code = Some(code);
    }

    /// Converts a completed command into a result: tagged NO and BAD become
    /// errors carrying the server text and response code.
    pub fn into_result(self) -> Result<Self> {
        let is_no = self.command == "NO";
        if !is_no && self.command != "BAD" {
            return Ok(self);
        }
        let text = self
            .human_readable
            .unwrap_or_else(|| "Error".to_string());
        if is_no {
            Err(Error::No {
                text,
                code: self.code,
            })
        } else {
            Err(Error::Bad {
                text,
                code: self.code,
            })
        }
    }

    /// Extracts capability names from a `* CAPABILITY ...` response.
    #[must_use]
    pub fn capability_listing(&self) -> Option<Vec<String>> {
        if self.command != "CAPABILITY" {
            return None;
        }
        Some(
            self.attributes
                .iter()
                .filter_map(Attribute::as_str)
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

/// Section items are upper-cased when scalar, kept as-is inside lists.
fn code_value(attr: &Attribute) -> Option<CodeValue> {
    match attr {
        Attribute::List(items) => Some(CodeValue::List(
            items
                .iter()
                .filter_map(Attribute::as_str)
                .map(|s| s.trim().to_string())
                .collect(),
        )),
        Attribute::Nil => None,
        other => other
            .as_str()
            .map(|s| CodeValue::Scalar(s.trim().to_uppercase())),
    }
}
