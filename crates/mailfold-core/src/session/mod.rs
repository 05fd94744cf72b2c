//! Mailbox session seam.
//!
//! The engine talks to remote mailboxes only through [`MailboxConnector`] and
//! [`MailboxSession`]. [`ImapConnector`] is the production implementation;
//! tests supply scripted ones.

mod imap;

use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;

pub use imap::{ImapConnector, ImapSession};

use crate::account::{Endpoint, Secret};

/// Errors raised by a connector or an open session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The endpoint could not be reached.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The server rejected the credentials.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The operation did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with an error or malformed data.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The message does not exist (any more).
    #[error("message {0} not found")]
    NotFound(u32),
}

/// Message flags the engine changes remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// The message has been read.
    Seen,
}

impl Flag {
    /// Returns the protocol flag name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
        }
    }
}

/// Login material presented when opening a session.
#[derive(Debug, Clone)]
pub struct Login {
    /// Username.
    pub username: String,
    /// Decrypted secret.
    pub secret: Secret,
}

/// One message as listed by a session, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// Protocol-assigned id, unique within the account's mailbox.
    pub remote_id: u32,
    /// Decoded subject header, if present.
    pub subject: Option<String>,
    /// Decoded sender header, if present.
    pub from: Option<String>,
    /// Raw date header, if present.
    pub date: Option<String>,
    /// Protocol flags.
    pub flags: Vec<String>,
}

/// Opens sessions against a mailbox endpoint.
pub trait MailboxConnector: Send + Sync + 'static {
    /// Session type produced by this connector.
    type Session: MailboxSession;

    /// Connects, authenticates and selects the mailbox.
    fn connect(
        &self,
        endpoint: &Endpoint,
        login: &Login,
    ) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;
}

/// A live, authenticated session with one mailbox selected.
pub trait MailboxSession: Send + 'static {
    /// Number of messages in the mailbox.
    fn total(&self) -> u32;

    /// Lists messages in an inclusive, 1-based sequence range.
    fn list(
        &mut self,
        range: RangeInclusive<u32>,
    ) -> impl Future<Output = Result<Vec<RawRecord>, SessionError>> + Send;

    /// Adds or removes `flag` on a message.
    fn set_flag(
        &mut self,
        remote_id: u32,
        flag: Flag,
        add: bool,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Downloads the raw bytes of a message.
    fn fetch_raw(
        &mut self,
        remote_id: u32,
    ) -> impl Future<Output = Result<Vec<u8>, SessionError>> + Send;

    /// Releases the session. Never fails; problems are only logged.
    fn close(self) -> impl Future<Output = ()> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_names() {
        assert_eq!(Flag::Seen.as_str(), "\\Seen");
    }
}
