//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses.

use std::sync::atomic::{AtomicU64, Ordering};

/// Tag generator for IMAP commands.
///
/// Generates unique sequential tags in the format `W1`, `W2`, ... for the
/// lifetime of one connection.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU64,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU64::new(0),
            prefix,
        }
    }

    /// Generates the next tag.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        format!("{}{n}", self.prefix)
    }

    /// Returns the number of tags generated so far.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('W')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_generation() {
        let generator = TagGenerator::default();
        assert_eq!(generator.next(), "W1");
        assert_eq!(generator.next(), "W2");
        assert_eq!(generator.next(), "W3");
        assert_eq!(generator.current(), 3);
    }

    #[test]
    fn test_custom_prefix() {
        let generator = TagGenerator::new('T');
        assert_eq!(generator.next(), "T1");
    }

    #[test]
    fn test_strictly_increasing() {
        let generator = TagGenerator::default();
        let mut last = 0u64;
        for _ in 0..10_000 {
            let tag = generator.next();
            let n: u64 = tag[1..].parse().unwrap_or_default();
            assert!(n > last, "tag {tag} not after W{last}");
            last = n;
        }
    }
}
