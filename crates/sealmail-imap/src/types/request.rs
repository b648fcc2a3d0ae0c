//! Structured command requests.

use super::Attribute;

/// A command ready to be queued.
///
/// The tag is not part of the request: the queue assigns it when the command
/// is enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Command verb, e.g. `SELECT` or `UID FETCH`.
    pub command: String,
    /// Arguments.
    pub attributes: Vec<Attribute>,
    /// Arguments carry credentials; only the verb may be logged.
    pub sensitive: bool,
    /// Literals in the responses to this command are decoded as strings.
    pub value_as_string: bool,
}

impl Request {
    /// Creates a request without arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            attributes: Vec::new(),
            sensitive: false,
            value_as_string: true,
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Replaces the arguments.
    #[must_use]
    pub fn attributes(mut self, attributes: Vec<Attribute>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Marks the request as carrying credentials.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Keeps literals in responses as raw bytes.
    #[must_use]
    pub const fn raw_literals(mut self) -> Self {
        self.value_as_string = false;
        self
    }

    /// Returns the upper-cased verb.
    #[must_use]
    pub fn verb(&self) -> String {
        self.command.trim().to_uppercase()
    }

    /// Returns the first string argument, which for mailbox commands is the
    /// mailbox path.
    #[must_use]
    pub fn first_string(&self) -> Option<&str> {
        self.attributes.iter().find_map(|attr| match attr {
            Attribute::String(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

impl From<&str> for Request {
    fn from(command: &str) -> Self {
        Self::new(command)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let request = Request::new("select")
            .attribute(Attribute::string("INBOX"))
            .raw_literals();
        assert_eq!(request.verb(), "SELECT");
        assert_eq!(request.first_string(), Some("INBOX"));
        assert!(!request.value_as_string);
        assert!(!request.sensitive);
    }
}
