//! Server capability set.

/// Ordered set of server capabilities.
///
/// Names are stored upper-cased and trimmed. The set is always replaced as a
/// whole when the server lists its capabilities again; listings are never
/// merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    names: Vec<String>,
}

impl Capabilities {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { names: Vec::new() }
    }

    /// Builds a set from a server listing, dropping duplicates.
    pub fn from_listing<I, S>(listing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in listing {
            let name = name.as_ref().trim().to_uppercase();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        Self { names }
    }

    /// Replaces the whole set.
    pub fn replace<I, S>(&mut self, listing: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        *self = Self::from_listing(listing);
    }

    /// Empties the set (after STARTTLS the old listing is no longer trusted).
    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// Checks for a capability, case-insensitively.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Returns `true` if the server advertises the SASL mechanism.
    #[must_use]
    pub fn has_auth(&self, mechanism: &str) -> bool {
        self.names.iter().any(|n| {
            n.strip_prefix("AUTH=")
                .is_some_and(|m| m.eq_ignore_ascii_case(mechanism))
        })
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Iterates over the names in server order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns the names as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}

impl std::fmt::Display for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_listing_normalizes() {
        let caps = Capabilities::from_listing(["imap4rev1", " IDLE ", "idle", ""]);
        assert_eq!(caps.as_slice(), ["IMAP4REV1", "IDLE"]);
        assert_eq!(caps.len(), 2);
    }

    #[test]
    fn replace_does_not_merge() {
        let mut caps = Capabilities::from_listing(["A", "B"]);
        caps.replace(["C"]);
        assert_eq!(caps.as_slice(), ["C"]);
        assert!(!caps.has("A"));
    }

    #[test]
    fn has_is_case_insensitive() {
        let caps = Capabilities::from_listing(["COMPRESS=DEFLATE"]);
        assert!(caps.has("compress=deflate"));
        assert!(!caps.has("COMPRESS"));
    }

    #[test]
    fn has_auth() {
        let caps = Capabilities::from_listing(["AUTH=PLAIN", "AUTH=XOAUTH2"]);
        assert!(caps.has_auth("xoauth2"));
        assert!(caps.has_auth("PLAIN"));
        assert!(!caps.has_auth("LOGIN"));
    }

    #[test]
    fn display_joins() {
        let caps = Capabilities::from_listing(["IMAP4rev1", "IDLE"]);
        assert_eq!(caps.to_string(), "IMAP4REV1 IDLE");
    }
}
