//! Sequence-range planning.
//!
//! Page 0 is the newest `page_size` messages, page 1 the ones before that,
//! and so on, over the 1-based inclusive sequence numbers of a mailbox.

use std::fmt;
use std::num::NonZeroU32;
use std::ops::RangeInclusive;

/// A window of sequence numbers to fetch, or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceRange {
    /// Nothing to fetch for this page.
    Empty,
    /// Inclusive span with `1 <= start <= end`.
    Span {
        /// First sequence number.
        start: u32,
        /// Last sequence number.
        end: u32,
    },
}

impl SequenceRange {
    /// Plans the range for `page` of a mailbox holding `total` messages.
    ///
    /// Total: defined for every input, including `total == 0` and pages far
    /// past the end.
    #[must_use]
    pub fn plan(total: u32, page: u32, page_size: NonZeroU32) -> Self {
        let size = u64::from(page_size.get());
        let Some(end) = u64::from(page)
            .checked_mul(size)
            .and_then(|skipped| u64::from(total).checked_sub(skipped))
            .filter(|&end| end >= 1)
        else {
            return Self::Empty;
        };

        let start = end.saturating_sub(size - 1).max(1);
        match (u32::try_from(start), u32::try_from(end)) {
            (Ok(start), Ok(end)) => Self::Span { start, end },
            _ => Self::Empty,
        }
    }

    /// Returns true for [`SequenceRange::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Number of messages in the range.
    #[must_use]
    pub const fn len(&self) -> u32 {
        match *self {
            Self::Empty => 0,
            Self::Span { start, end } => end - start + 1,
        }
    }

    /// The span as an inclusive range, if any.
    #[must_use]
    pub const fn to_inclusive(&self) -> Option<RangeInclusive<u32>> {
        match *self {
            Self::Empty => None,
            Self::Span { start, end } => Some(start..=end),
        }
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::Span { start, end } => write!(f, "{start}:{end}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const FIFTY: NonZeroU32 = NonZeroU32::new(50).unwrap();

    fn span(start: u32, end: u32) -> SequenceRange {
        SequenceRange::Span { start, end }
    }

    #[test]
    fn test_empty_mailbox() {
        assert_eq!(SequenceRange::plan(0, 0, FIFTY), SequenceRange::Empty);
    }

    #[test]
    fn test_first_page() {
        assert_eq!(SequenceRange::plan(120, 0, FIFTY), span(71, 120));
    }

    #[test]
    fn test_partial_last_page() {
        assert_eq!(SequenceRange::plan(120, 2, FIFTY), span(1, 20));
    }

    #[test]
    fn test_page_past_end() {
        assert_eq!(SequenceRange::plan(30, 1, FIFTY), SequenceRange::Empty);
        assert_eq!(SequenceRange::plan(100, 2, FIFTY), SequenceRange::Empty);
        assert_eq!(SequenceRange::plan(120, 3, FIFTY), SequenceRange::Empty);
    }

    #[test]
    fn test_small_mailbox() {
        assert_eq!(SequenceRange::plan(30, 0, FIFTY), span(1, 30));
        assert_eq!(SequenceRange::plan(1, 0, FIFTY), span(1, 1));
    }

    #[test]
    fn test_extremes_do_not_overflow() {
        let max = NonZeroU32::new(u32::MAX).unwrap();
        assert_eq!(SequenceRange::plan(u32::MAX, u32::MAX, max), SequenceRange::Empty);
        assert_eq!(SequenceRange::plan(u32::MAX, 0, max), span(1, u32::MAX));
    }

    #[test]
    fn test_display_and_len() {
        assert_eq!(span(71, 120).to_string(), "71:120");
        assert_eq!(span(71, 120).len(), 50);
        assert_eq!(SequenceRange::Empty.to_string(), "empty");
        assert_eq!(SequenceRange::Empty.len(), 0);
        assert_eq!(span(3, 4).to_inclusive(), Some(3..=4));
    }

    proptest! {
        #[test]
        fn plan_is_total_and_bounded(total in any::<u32>(), page in any::<u32>(), size in 1u32..=1000) {
            let size = NonZeroU32::new(size).unwrap();
            match SequenceRange::plan(total, page, size) {
                SequenceRange::Empty => {}
                SequenceRange::Span { start, end } => {
                    prop_assert!(start >= 1);
                    prop_assert!(start <= end);
                    prop_assert!(end <= total);
                    prop_assert!(end - start < size.get());
                }
            }
        }

        #[test]
        fn pages_tile_the_mailbox(total in 0u32..2000, size in 1u32..=100) {
            let size = NonZeroU32::new(size).unwrap();
            let mut covered = 0u32;
            let mut page = 0;
            while let SequenceRange::Span { start, end } = SequenceRange::plan(total, page, size) {
                prop_assert_eq!(end, total - covered);
                covered += end - start + 1;
                page += 1;
            }
            prop_assert_eq!(covered, total);
        }
    }
}
