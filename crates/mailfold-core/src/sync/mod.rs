//! Multi-account synchronization.
//!
//! [`SyncEngine`] fans one fetch task per account out onto a
//! [`JoinSet`](tokio::task::JoinSet), merges the results into [`SyncState`]
//! by [`MessageId`] and writes the merged set to the
//! [`LocalCache`](crate::cache::LocalCache). Local `\Seen` changes carry a
//! sequence number so a merge never reverts one made while the round was in
//! flight.

mod engine;
mod fetch;
mod message;
mod progress;
mod range;
mod state;

pub use engine::{SyncEngine, SyncReport};
pub use fetch::{FetchError, FetchErrorKind, FetchOutcome, FetchPolicy, fetch_page};
pub use message::{MessageDate, MessageId, MessageSummary, UNKNOWN_SENDER};
pub use progress::{Progress, ProgressReporter, percent};
pub use range::SequenceRange;
pub use state::{LocalChange, MailboxStats, RoundResult, SyncState, compare};
