//! Snapshot trimming.

use crate::sync::{MessageSummary, compare};

/// Default number of messages kept in a snapshot.
pub const DEFAULT_CAPACITY: usize = 500;

/// Orders `messages` unread first, newest first within each tier, and keeps
/// at most `capacity` of them.
#[must_use]
pub fn trim(messages: &[MessageSummary], capacity: usize) -> Vec<MessageSummary> {
    let (mut unread, mut read): (Vec<_>, Vec<_>) =
        messages.iter().cloned().partition(|m| !m.is_seen());
    unread.sort_by(compare);
    read.sort_by(compare);

    unread.append(&mut read);
    unread.truncate(capacity);
    unread
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::account::AccountId;
    use crate::sync::MessageDate;

    fn message(remote_id: u32, age_minutes: i64, seen: bool) -> MessageSummary {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut flags = BTreeSet::new();
        if seen {
            flags.insert("\\Seen".to_string());
        }
        MessageSummary {
            remote_id,
            account_id: AccountId::new("a"),
            subject: String::new(),
            sender: "x@example.com".into(),
            date: MessageDate::Parsed(base - Duration::minutes(age_minutes)),
            flags,
        }
    }

    #[test]
    fn test_keeps_all_unread_then_newest_read() {
        // Unread messages are the oldest ones, so a plain recency cut would drop them.
        let messages: Vec<_> = (0..600u32)
            .map(|i| message(i, i64::from(i), i < 550))
            .collect();

        let kept = trim(&messages, 500);

        assert_eq!(kept.len(), 500);
        assert_eq!(kept.iter().filter(|m| !m.is_seen()).count(), 50);
        assert!(kept[..50].iter().all(|m| !m.is_seen()));
        let read: Vec<_> = kept[50..].iter().map(|m| m.remote_id).collect();
        assert_eq!(read, (0..450).collect::<Vec<_>>());
    }

    #[test]
    fn test_order_of_input_does_not_matter() {
        let mut messages: Vec<_> = (0..20u32).map(|i| message(i, i64::from(i), i % 3 == 0)).collect();
        let forward = trim(&messages, 10);
        messages.reverse();
        assert_eq!(trim(&messages, 10), forward);
    }

    #[test]
    fn test_under_capacity_keeps_everything() {
        let messages = vec![message(1, 0, true), message(2, 5, false)];
        let kept = trim(&messages, 500);
        assert_eq!(kept.iter().map(|m| m.remote_id).collect::<Vec<_>>(), vec![2, 1]);
    }
}
