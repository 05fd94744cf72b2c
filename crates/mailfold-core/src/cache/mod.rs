//! Local cache of the aggregated message set.
//!
//! The cache holds one bounded snapshot per user namespace. Unread messages
//! are kept in preference to read ones when the snapshot is trimmed.

mod snapshot;
mod store;

pub use snapshot::{DEFAULT_CAPACITY, trim};
pub use store::{LocalCache, namespace_for};
