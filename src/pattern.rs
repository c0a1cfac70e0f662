//! Quality patterns: fixed slot sequences that shape every served page
//!
//! A pattern encodes an editorial mix ("mostly new, some relevant, one top")
//! as position-indexed slots rather than proportions. The backend fills each
//! slot with an item of that exact status or skips it; the sequence length is
//! the page size.

use crate::content::StatusTag::{self, New, Rel, Top};

/// Slot sequence for full feed pages.
pub const FEED_PATTERN: [StatusTag; 24] = [
    New, New, New, Top, New, New, New, New, Rel, New, Rel, New,
    New, Rel, Rel, Rel, New, New, New, New, Rel, Rel, Rel, New,
];

/// Slot sequence for thread-comment pages.
pub const COMMENT_PATTERN: [StatusTag; 14] = [
    Rel, Top, New, Rel, New, New, New, Rel, New, New, Rel, Rel, New, New,
];

/// Slot sequence for compact activity widgets.
pub const COMPACT_PATTERN: [StatusTag; 7] = [New, New, Rel, Top, Rel, New, New];

/// Named page layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Large thread-listing pages (24 slots).
    Feed,
    /// Comment pages under a thread (14 slots).
    Comment,
    /// Profile and activity summaries (7 slots).
    Compact,
}

impl PatternKind {
    /// The slot sequence for this kind.
    pub fn slots(self) -> &'static [StatusTag] {
        match self {
            PatternKind::Feed => &FEED_PATTERN,
            PatternKind::Comment => &COMMENT_PATTERN,
            PatternKind::Compact => &COMPACT_PATTERN,
        }
    }

    /// Page size for this kind.
    pub fn page_size(self) -> usize {
        self.slots().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(slots: &[StatusTag], tag: StatusTag) -> usize {
        slots.iter().filter(|s| **s == tag).count()
    }

    #[test]
    fn test_page_sizes() {
        assert_eq!(PatternKind::Feed.page_size(), 24);
        assert_eq!(PatternKind::Comment.page_size(), 14);
        assert_eq!(PatternKind::Compact.page_size(), 7);
    }

    #[test]
    fn test_each_pattern_has_one_top_slot() {
        assert_eq!(count(&FEED_PATTERN, Top), 1);
        assert_eq!(count(&COMMENT_PATTERN, Top), 1);
        assert_eq!(count(&COMPACT_PATTERN, Top), 1);
    }

    #[test]
    fn test_feed_pattern_mix() {
        // Roughly 60% new / 35% relevant / 5% top.
        assert_eq!(count(&FEED_PATTERN, New), 15);
        assert_eq!(count(&FEED_PATTERN, Rel), 8);
        assert_eq!(FEED_PATTERN[3], Top);
    }

    #[test]
    fn test_comment_pattern_opens_with_relevant() {
        assert_eq!(COMMENT_PATTERN[0], Rel);
        assert_eq!(COMMENT_PATTERN[1], Top);
        assert_eq!(count(&COMMENT_PATTERN, New), 8);
        assert_eq!(count(&COMMENT_PATTERN, Rel), 5);
    }

    #[test]
    fn test_compact_pattern_centers_top() {
        assert_eq!(COMPACT_PATTERN[3], Top);
        assert_eq!(count(&COMPACT_PATTERN, New), 4);
        assert_eq!(count(&COMPACT_PATTERN, Rel), 2);
    }
}
