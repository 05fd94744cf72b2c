//! Aggregated sync state and the merge algorithm.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;

use super::fetch::FetchError;
use super::message::{MessageId, MessageSummary};
use crate::account::AccountId;

/// Message order: newest first, then account id, then remote id descending.
pub fn compare(a: &MessageSummary, b: &MessageSummary) -> Ordering {
    b.date
        .sort_key()
        .cmp(&a.date.sort_key())
        .then_with(|| a.account_id.cmp(&b.account_id))
        .then_with(|| b.remote_id.cmp(&a.remote_id))
}

/// A local `\Seen` change not yet known to be reflected in fetched data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mutation {
    seq: u64,
    seen: bool,
    confirmed_at: Option<u64>,
}

/// Result of applying a local change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalChange {
    /// Sequence number of the change.
    pub seq: u64,
    /// `\Seen` before the change.
    pub previous: bool,
    /// `\Seen` after the change.
    pub seen: bool,
}

/// Unread counts for a dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStats {
    /// Messages held.
    pub total: usize,
    /// Messages without `\Seen`.
    pub unread: usize,
    /// Unread per account; accounts with none are omitted.
    pub unread_by_account: BTreeMap<AccountId, usize>,
}

/// Everything a completed round contributes.
#[derive(Debug, Default)]
pub struct RoundResult {
    /// Summaries fetched across all accounts.
    pub fetched: Vec<MessageSummary>,
    /// Mailbox size per successful account.
    pub totals: BTreeMap<AccountId, u32>,
    /// Failed accounts.
    pub errors: Vec<FetchError>,
}

/// Process-lifetime aggregate of every account's messages.
///
/// Holds at most one summary per [`MessageId`], sorted by [`compare`].
#[derive(Debug, Default)]
pub struct SyncState {
    messages: Vec<MessageSummary>,
    current_page: u32,
    totals: BTreeMap<AccountId, u32>,
    totals_scope: Vec<AccountId>,
    in_flight: bool,
    errors: BTreeMap<AccountId, FetchError>,
    clock: u64,
    mutations: HashMap<MessageId, Mutation>,
}

impl SyncState {
    /// Creates empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Held messages in display order.
    #[must_use]
    pub fn messages(&self) -> &[MessageSummary] {
        &self.messages
    }

    /// Looks up a held message.
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&MessageSummary> {
        self.messages
            .iter()
            .find(|m| m.remote_id == id.remote_id && m.account_id == id.account_id)
    }

    /// Page cursor of the last round or skip.
    #[must_use]
    pub const fn current_page(&self) -> u32 {
        self.current_page
    }

    /// True between [`begin_round`](Self::begin_round) and
    /// [`finish_round`](Self::finish_round).
    #[must_use]
    pub const fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Largest mailbox size reported in the last round.
    #[must_use]
    pub fn known_total(&self) -> u32 {
        self.totals.values().copied().max().unwrap_or(0)
    }

    /// Mailbox size per account reported in the last round.
    #[must_use]
    pub const fn totals(&self) -> &BTreeMap<AccountId, u32> {
        &self.totals
    }

    /// Errors of the last round, ordered by account.
    #[must_use]
    pub fn errors(&self) -> Vec<FetchError> {
        self.errors.values().cloned().collect()
    }

    /// Replaces the held set, e.g. from the cache at start-up.
    pub fn restore(&mut self, messages: Vec<MessageSummary>) {
        let mut by_id: HashMap<MessageId, MessageSummary> = HashMap::with_capacity(messages.len());
        for message in messages {
            by_id.insert(message.id(), message);
        }
        self.messages = by_id.into_values().collect();
        self.messages.sort_by(compare);
    }

    /// Number of held messages belonging to `scope`.
    #[must_use]
    pub fn held_in(&self, scope: &[AccountId]) -> usize {
        self.messages
            .iter()
            .filter(|m| scope.contains(&m.account_id))
            .count()
    }

    /// Whether a round for `page` over `scope` can be answered from held data.
    ///
    /// `scope` must be sorted and deduplicated.
    #[must_use]
    pub fn can_skip(&self, scope: &[AccountId], page: u32, page_size: NonZeroU32) -> bool {
        let held = self.held_in(scope) as u64;
        let needed = (u64::from(page) + 1) * u64::from(page_size.get());
        if held >= needed {
            return true;
        }
        let known = u64::from(self.known_total());
        self.totals_scope == scope && known > 0 && held >= known
    }

    /// Moves the page cursor without fetching.
    pub const fn set_page(&mut self, page: u32) {
        self.current_page = page;
    }

    /// Marks a round as issued and returns its issue mark.
    pub const fn begin_round(&mut self) -> u64 {
        self.in_flight = true;
        self.clock
    }

    /// Merges a completed round issued at `issued`.
    ///
    /// `scope` must be sorted and deduplicated.
    pub fn finish_round(&mut self, scope: Vec<AccountId>, page: u32, issued: u64, round: RoundResult) {
        self.merge(round.fetched, issued);
        self.totals = round.totals;
        self.totals_scope = scope;
        self.errors = round
            .errors
            .into_iter()
            .map(|e| (e.account_id.clone(), e))
            .collect();
        self.current_page = page;
        self.in_flight = false;
    }

    /// Merges fetched summaries into the held set.
    ///
    /// A fetched summary replaces the held one with the same identity. A
    /// pending local change overrides its `\Seen` flag unless the change was
    /// confirmed remotely at or before `issued`, in which case the fetched
    /// data already reflects it and the change is retired.
    pub fn merge(&mut self, fetched: Vec<MessageSummary>, issued: u64) {
        let mut by_id: HashMap<MessageId, MessageSummary> =
            HashMap::with_capacity(self.messages.len() + fetched.len());
        for message in self.messages.drain(..) {
            by_id.insert(message.id(), message);
        }

        for mut message in fetched {
            let id = message.id();
            if let Some(mutation) = self.mutations.get(&id).copied() {
                if mutation.confirmed_at.is_some_and(|at| at <= issued) {
                    self.mutations.remove(&id);
                } else {
                    message.set_seen(mutation.seen);
                }
            }
            by_id.insert(id, message);
        }

        self.messages = by_id.into_values().collect();
        self.messages.sort_by(compare);
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Applies a local `\Seen` change; `None` toggles.
    ///
    /// Returns `None` if the message is not held.
    pub fn apply_local(&mut self, id: &MessageId, seen: Option<bool>) -> Option<LocalChange> {
        let index = self
            .messages
            .iter()
            .position(|m| m.remote_id == id.remote_id && m.account_id == id.account_id)?;
        let seq = self.tick();
        let message = &mut self.messages[index];
        let previous = message.is_seen();
        let seen = seen.unwrap_or(!previous);
        message.set_seen(seen);
        self.mutations.insert(
            id.clone(),
            Mutation {
                seq,
                seen,
                confirmed_at: None,
            },
        );
        Some(LocalChange {
            seq,
            previous,
            seen,
        })
    }

    /// Records that the remote accepted change `seq`.
    pub fn confirm(&mut self, id: &MessageId, seq: u64) {
        let at = self.tick();
        if let Some(mutation) = self.mutations.get_mut(id)
            && mutation.seq == seq
        {
            mutation.confirmed_at = Some(at);
        }
    }

    /// Undoes change `seq` after the remote rejected it.
    ///
    /// Does nothing if a newer change has superseded it. Returns whether the
    /// change was undone.
    pub fn revert(&mut self, id: &MessageId, change: LocalChange) -> bool {
        if self.mutations.get(id).is_none_or(|m| m.seq != change.seq) {
            return false;
        }
        self.mutations.remove(id);
        if let Some(message) = self
            .messages
            .iter_mut()
            .find(|m| m.remote_id == id.remote_id && m.account_id == id.account_id)
        {
            message.set_seen(change.previous);
        }
        true
    }

    /// Drops change `seq` but keeps its local effect until the next fetch.
    pub fn settle(&mut self, id: &MessageId, seq: u64) {
        if self.mutations.get(id).is_some_and(|m| m.seq == seq) {
            self.mutations.remove(id);
        }
    }

    /// Number of changes not yet retired.
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.mutations.len()
    }

    /// Keeps only messages whose account satisfies `keep`. Returns how many
    /// were dropped.
    pub fn retain_accounts(&mut self, mut keep: impl FnMut(&AccountId) -> bool) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| keep(&m.account_id));
        self.mutations.retain(|id, _| keep(&id.account_id));
        self.totals.retain(|id, _| keep(id));
        self.errors.retain(|id, _| keep(id));
        before - self.messages.len()
    }

    /// Messages of page `index`.
    #[must_use]
    pub fn page(&self, index: u32, page_size: NonZeroU32) -> &[MessageSummary] {
        let size = page_size.get() as usize;
        let start = (index as usize).saturating_mul(size).min(self.messages.len());
        let end = start.saturating_add(size).min(self.messages.len());
        &self.messages[start..end]
    }

    /// Unread counts.
    #[must_use]
    pub fn stats(&self) -> MailboxStats {
        let mut stats = MailboxStats {
            total: self.messages.len(),
            ..MailboxStats::default()
        };
        for message in self.messages.iter().filter(|m| !m.is_seen()) {
            stats.unread += 1;
            *stats
                .unread_by_account
                .entry(message.account_id.clone())
                .or_default() += 1;
        }
        stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::*;
    use crate::sync::message::MessageDate;

    const FIFTY: NonZeroU32 = NonZeroU32::new(50).unwrap();

    fn summary(account: &str, remote_id: u32, minute: u32, seen: bool) -> MessageSummary {
        let mut flags = BTreeSet::new();
        if seen {
            flags.insert("\\Seen".to_string());
        }
        MessageSummary {
            remote_id,
            account_id: AccountId::new(account),
            subject: format!("{account}-{remote_id}"),
            sender: "x@example.com".into(),
            date: MessageDate::Parsed(Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap()),
            flags,
        }
    }

    fn ids(state: &SyncState) -> Vec<(String, u32)> {
        state
            .messages()
            .iter()
            .map(|m| (m.account_id.to_string(), m.remote_id))
            .collect()
    }

    #[test]
    fn test_merge_sorts_newest_first() {
        let mut state = SyncState::new();
        state.merge(
            vec![
                summary("a", 1, 1, false),
                summary("b", 1, 3, false),
                summary("a", 2, 2, false),
            ],
            0,
        );
        assert_eq!(
            ids(&state),
            vec![("b".into(), 1), ("a".into(), 2), ("a".into(), 1)]
        );
    }

    #[test]
    fn test_same_remote_id_in_two_accounts_is_kept_twice() {
        let mut state = SyncState::new();
        state.merge(vec![summary("a", 7, 1, false), summary("b", 7, 1, false)], 0);
        assert_eq!(state.messages().len(), 2);
    }

    #[test]
    fn test_fresh_fetch_wins() {
        let mut state = SyncState::new();
        state.merge(vec![summary("a", 1, 1, false)], 0);
        let mut fresh = summary("a", 1, 1, true);
        fresh.subject = "renamed".into();
        state.merge(vec![fresh], 0);

        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].subject, "renamed");
        assert!(state.messages()[0].is_seen());
    }

    #[test]
    fn test_unparseable_dates_sort_last() {
        let mut state = SyncState::new();
        let mut undated = summary("a", 9, 0, false);
        undated.date = MessageDate::Unparseable;
        state.merge(vec![undated, summary("a", 1, 1, false)], 0);
        assert_eq!(ids(&state), vec![("a".into(), 1), ("a".into(), 9)]);
    }

    #[test]
    fn test_local_change_survives_stale_fetch() {
        let mut state = SyncState::new();
        state.merge(vec![summary("a", 1, 1, false)], 0);

        let issued = state.begin_round();
        let id = MessageId::new("a", 1);
        let change = state.apply_local(&id, Some(true)).unwrap();
        assert!(!change.previous);

        state.merge(vec![summary("a", 1, 1, false)], issued);
        assert!(state.get(&id).unwrap().is_seen());

        // Confirmed after the round was issued: still overrides.
        state.confirm(&id, change.seq);
        state.merge(vec![summary("a", 1, 1, false)], issued);
        assert!(state.get(&id).unwrap().is_seen());
        assert_eq!(state.pending_changes(), 1);

        // A round issued after confirmation trusts the fetch.
        let later = state.begin_round();
        state.merge(vec![summary("a", 1, 1, true)], later);
        assert!(state.get(&id).unwrap().is_seen());
        assert_eq!(state.pending_changes(), 0);
    }

    #[test]
    fn test_revert_only_latest_change() {
        let mut state = SyncState::new();
        state.merge(vec![summary("a", 1, 1, false)], 0);
        let id = MessageId::new("a", 1);

        let first = state.apply_local(&id, None).unwrap();
        let second = state.apply_local(&id, None).unwrap();
        assert!(first.seen);
        assert!(!second.seen);

        assert!(!state.revert(&id, first));
        assert!(!state.get(&id).unwrap().is_seen());

        assert!(state.revert(&id, second));
        assert!(state.get(&id).unwrap().is_seen());
        assert_eq!(state.pending_changes(), 0);
    }

    #[test]
    fn test_apply_to_unknown_message() {
        let mut state = SyncState::new();
        assert!(state.apply_local(&MessageId::new("a", 1), None).is_none());
    }

    #[test]
    fn test_can_skip() {
        let mut state = SyncState::new();
        let scope = vec![AccountId::new("a")];
        let fetched: Vec<_> = (1..=60).map(|i| summary("a", i, 0, true)).collect();
        state.finish_round(
            scope.clone(),
            0,
            0,
            RoundResult {
                fetched,
                totals: BTreeMap::from([(AccountId::new("a"), 60)]),
                errors: Vec::new(),
            },
        );

        assert!(state.can_skip(&scope, 0, FIFTY));
        // 60 held covers the whole mailbox of 60.
        assert!(state.can_skip(&scope, 1, FIFTY));
        // Another scope does not inherit the known total.
        let other = vec![AccountId::new("a"), AccountId::new("b")];
        assert!(!state.can_skip(&other, 1, FIFTY));
        assert!(!state.can_skip(&[AccountId::new("b")], 0, FIFTY));
    }

    #[test]
    fn test_round_bookkeeping() {
        let mut state = SyncState::new();
        let issued = state.begin_round();
        assert!(state.in_flight());
        state.finish_round(
            vec![AccountId::new("a"), AccountId::new("b")],
            2,
            issued,
            RoundResult {
                fetched: vec![summary("a", 1, 0, false)],
                totals: BTreeMap::from([(AccountId::new("a"), 120)]),
                errors: vec![FetchError::new(
                    AccountId::new("b"),
                    crate::sync::FetchErrorKind::Connect,
                    "refused",
                )],
            },
        );

        assert!(!state.in_flight());
        assert_eq!(state.current_page(), 2);
        assert_eq!(state.known_total(), 120);
        assert_eq!(state.errors().len(), 1);
        assert_eq!(state.errors()[0].account_id, AccountId::new("b"));
    }

    #[test]
    fn test_retain_and_stats() {
        let mut state = SyncState::new();
        state.merge(
            vec![
                summary("a", 1, 1, false),
                summary("a", 2, 2, true),
                summary("b", 1, 3, false),
                summary("c", 1, 4, true),
            ],
            0,
        );

        let stats = state.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.unread, 2);
        assert_eq!(
            stats.unread_by_account,
            BTreeMap::from([(AccountId::new("a"), 1), (AccountId::new("b"), 1)])
        );

        let dropped = state.retain_accounts(|id| id.as_str() != "a");
        assert_eq!(dropped, 2);
        assert!(state.messages().iter().all(|m| m.account_id.as_str() != "a"));
    }

    #[test]
    fn test_page_slices() {
        let mut state = SyncState::new();
        state.merge((0..5).map(|i| summary("a", i, i, false)).collect(), 0);
        let two = NonZeroU32::new(2).unwrap();
        assert_eq!(state.page(0, two).len(), 2);
        assert_eq!(state.page(2, two).len(), 1);
        assert!(state.page(3, two).is_empty());
        assert!(state.page(u32::MAX, two).is_empty());
    }

    #[test]
    fn test_restore_dedups() {
        let mut state = SyncState::new();
        state.restore(vec![summary("a", 1, 1, false), summary("a", 1, 1, true)]);
        assert_eq!(state.messages().len(), 1);
    }

    fn arb_summary() -> impl Strategy<Value = MessageSummary> {
        (0..3usize, 0..20u32, 0..60u32, any::<bool>()).prop_map(|(account, id, minute, seen)| {
            summary(["a", "b", "c"][account], id, minute, seen)
        })
    }

    proptest! {
        #[test]
        fn merge_is_idempotent_and_unique(
            held in prop::collection::vec(arb_summary(), 0..40),
            fetched in prop::collection::vec(arb_summary(), 0..40),
        ) {
            let mut state = SyncState::new();
            state.merge(held, 0);
            state.merge(fetched.clone(), 0);
            let once = state.messages().to_vec();
            state.merge(fetched, 0);
            prop_assert_eq!(state.messages(), once.as_slice());

            let unique: std::collections::HashSet<_> = once.iter().map(MessageSummary::id).collect();
            prop_assert_eq!(unique.len(), once.len());
        }

        #[test]
        fn order_ignores_arrival_order(mut fetched in prop::collection::vec(arb_summary(), 0..40)) {
            // Dedup first so both orders agree on which duplicate wins.
            let mut seen = std::collections::HashSet::new();
            fetched.retain(|m| seen.insert(m.id()));

            let mut forward = SyncState::new();
            forward.merge(fetched.clone(), 0);
            fetched.reverse();
            let mut backward = SyncState::new();
            backward.merge(fetched, 0);
            prop_assert_eq!(forward.messages(), backward.messages());
        }
    }
}
