//! Message summaries and their identity.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::session::{Flag, RawRecord};

/// Sender shown when a message has no usable `From` header.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Identity of a message across all accounts.
///
/// Remote ids are only unique within one account, so both halves are always
/// compared together.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId {
    /// Owning account.
    pub account_id: AccountId,
    /// Protocol-assigned id within that account's mailbox.
    pub remote_id: u32,
}

impl MessageId {
    /// Creates an identity.
    #[must_use]
    pub fn new(account_id: impl Into<AccountId>, remote_id: u32) -> Self {
        Self {
            account_id: account_id.into(),
            remote_id,
        }
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.account_id, self.remote_id)
    }
}

/// A message timestamp that may be missing or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDate {
    /// A parsed instant.
    Parsed(DateTime<Utc>),
    /// The header was absent or could not be parsed.
    Unparseable,
}

impl MessageDate {
    /// Parses a `Date` header value, degrading to [`MessageDate::Unparseable`].
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(mailfold_mime::parse_date)
            .map_or(Self::Unparseable, Self::Parsed)
    }

    /// Milliseconds since the epoch; unparseable dates sort as the epoch.
    #[must_use]
    pub fn sort_key(&self) -> i64 {
        match self {
            Self::Parsed(at) => at.timestamp_millis(),
            Self::Unparseable => 0,
        }
    }
}

/// A listed message as held in sync state and the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Protocol-assigned id within the account's mailbox.
    pub remote_id: u32,
    /// Owning account.
    pub account_id: AccountId,
    /// Subject line.
    pub subject: String,
    /// Sender address, or [`UNKNOWN_SENDER`].
    pub sender: String,
    /// Timestamp.
    pub date: MessageDate,
    /// Protocol flags such as `\Seen`.
    pub flags: BTreeSet<String>,
}

impl MessageSummary {
    /// Normalizes a raw listing record. Never fails.
    #[must_use]
    pub fn from_raw(record: RawRecord, account_id: &AccountId) -> Self {
        let sender = record
            .from
            .as_deref()
            .map(sender_address)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

        Self {
            remote_id: record.remote_id,
            account_id: account_id.clone(),
            subject: record.subject.unwrap_or_default(),
            sender,
            date: MessageDate::from_header(record.date.as_deref()),
            flags: record.flags.into_iter().collect(),
        }
    }

    /// Returns this message's identity key.
    #[must_use]
    pub fn id(&self) -> MessageId {
        MessageId::new(self.account_id.clone(), self.remote_id)
    }

    /// True if the message carries `\Seen`.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.flags.contains(Flag::Seen.as_str())
    }

    /// Adds or removes `\Seen`.
    pub fn set_seen(&mut self, seen: bool) {
        if seen {
            self.flags.insert(Flag::Seen.as_str().to_string());
        } else {
            self.flags.remove(Flag::Seen.as_str());
        }
    }
}

/// Extracts the address from `Name <addr>`, or trims a bare address.
fn sender_address(from: &str) -> String {
    let from = from.trim();
    match (from.rfind('<'), from.rfind('>')) {
        (Some(open), Some(close)) if open < close => from[open + 1..close].trim().to_string(),
        _ => from.trim_matches('"').to_string(),
    }
}
