//! Command tag generation.

use std::sync::atomic::{AtomicU32, Ordering};

/// Generates sequential command tags (`A0000`, `A0001`, ...).
///
/// Tags only need to be unique among commands in flight, so the counter wraps.
#[derive(Debug)]
pub struct TagGenerator {
    counter: AtomicU32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            counter: AtomicU32::new(0),
            prefix,
        }
    }

    /// Returns the next tag.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{n:04}", self.prefix)
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_tags() {
        let tags = TagGenerator::default();
        assert_eq!(tags.next(), "A0000");
        assert_eq!(tags.next(), "A0001");
    }

    #[test]
    fn test_custom_prefix() {
        let tags = TagGenerator::new('M');
        assert_eq!(tags.next(), "M0000");
    }

    #[test]
    fn test_wraps_instead_of_panicking() {
        let tags = TagGenerator::new('A');
        tags.counter.store(u32::MAX, Ordering::Relaxed);
        assert_eq!(tags.next(), format!("A{}", u32::MAX));
        assert_eq!(tags.next(), "A0000");
    }
}
