//! Per-account fetch task.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::message::MessageSummary;
use super::range::SequenceRange;
use crate::account::{Account, AccountId, CredentialError, CredentialProvider};
use crate::session::{Login, MailboxConnector, MailboxSession, SessionError};

/// Classification of a per-account failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// The credential could not be decrypted.
    Credential,
    /// The server rejected the credential.
    Auth,
    /// The endpoint could not be reached.
    Connect,
    /// Connecting took longer than the connect timeout.
    Timeout,
    /// Listing failed after the session was open.
    List,
    /// The task ended without reporting.
    Aborted,
}

/// A failure of one account's task. Never fatal to a sync round.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{account_id}: {message}")]
pub struct FetchError {
    /// Account that failed.
    pub account_id: AccountId,
    /// What went wrong.
    pub kind: FetchErrorKind,
    /// Detail for logs and display.
    pub message: String,
}

impl FetchError {
    /// Creates an error for `account_id`.
    #[must_use]
    pub fn new(account_id: AccountId, kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            account_id,
            kind,
            message: message.into(),
        }
    }

    fn from_session(account_id: &AccountId, error: SessionError) -> Self {
        let kind = match &error {
            SessionError::Auth(_) => FetchErrorKind::Auth,
            SessionError::Timeout(_) => FetchErrorKind::Timeout,
            SessionError::Connect(_) => FetchErrorKind::Connect,
            SessionError::Protocol(_) | SessionError::NotFound(_) => FetchErrorKind::List,
        };
        Self::new(account_id.clone(), kind, error.to_string())
    }

    /// A message suitable for showing to the user.
    #[must_use]
    pub const fn friendly(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Auth => "Invalid email or password. Please check your credentials.",
            FetchErrorKind::Connect => "Could not reach mail server. Check host/port.",
            FetchErrorKind::Timeout => "Connection timed out. Check server settings.",
            FetchErrorKind::Credential => "Stored password is missing or unreadable.",
            FetchErrorKind::List => "The server could not list messages.",
            FetchErrorKind::Aborted => "Sync was interrupted.",
        }
    }
}

/// Connect timing and retry settings for a task.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    /// Messages per page.
    pub page_size: NonZeroU32,
    /// Bound on each connect attempt.
    pub connect_timeout: Duration,
    /// Connect attempts before giving up.
    pub connect_attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

/// A successful page fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Account fetched.
    pub account_id: AccountId,
    /// Normalized summaries of the page.
    pub summaries: Vec<MessageSummary>,
    /// Mailbox size reported by the server.
    pub total: u32,
    /// Range that was requested.
    pub range: SequenceRange,
}

/// Decrypts the credential and opens a session within the connect timeout.
///
/// Authentication failures are not retried.
pub(crate) async fn open_session<C, P>(
    connector: &C,
    credentials: &P,
    account: &Account,
    policy: &FetchPolicy,
) -> Result<C::Session, FetchError>
where
    C: MailboxConnector,
    P: CredentialProvider,
{
    let secret = credentials.decrypt(&account.credential).map_err(|e| {
        let message = match e {
            CredentialError::Missing => "no stored password".to_string(),
            other => other.to_string(),
        };
        FetchError::new(account.id.clone(), FetchErrorKind::Credential, message)
    })?;
    let login = Login {
        username: account.username.clone(),
        secret,
    };

    let attempts = policy.connect_attempts.max(1);
    let mut last = SessionError::Connect("no attempt made".into());
    for attempt in 1..=attempts {
        match tokio::time::timeout(
            policy.connect_timeout,
            connector.connect(&account.endpoint, &login),
        )
        .await
        {
            Ok(Ok(session)) => return Ok(session),
            Ok(Err(e @ SessionError::Auth(_))) => {
                return Err(FetchError::from_session(&account.id, e));
            }
            Ok(Err(e)) => last = e,
            Err(_) => last = SessionError::Timeout(policy.connect_timeout),
        }

        debug!(account = %account.id, attempt, error = %last, "connect attempt failed");
        if attempt < attempts {
            tokio::time::sleep(policy.retry_delay).await;
        }
    }
    Err(FetchError::from_session(&account.id, last))
}

/// Fetches one page of an account's mailbox.
///
/// The session is closed on every path once it has been opened.
///
/// # Errors
///
/// Returns a [`FetchError`] for credential, connect or listing failures.
pub async fn fetch_page<C, P>(
    connector: Arc<C>,
    credentials: Arc<P>,
    account: Account,
    page: u32,
    policy: FetchPolicy,
) -> Result<FetchOutcome, FetchError>
where
    C: MailboxConnector,
    P: CredentialProvider,
{
    let mut session = open_session(connector.as_ref(), credentials.as_ref(), &account, &policy).await?;

    let total = session.total();
    let range = SequenceRange::plan(total, page, policy.page_size);
    let Some(span) = range.to_inclusive() else {
        session.close().await;
        debug!(account = %account.id, total, page, "page is past the end of the mailbox");
        return Ok(FetchOutcome {
            account_id: account.id,
            summaries: Vec::new(),
            total,
            range,
        });
    };

    let listed = session.list(span).await;
    session.close().await;

    let records = listed.map_err(|e| {
        warn!(account = %account.id, %range, error = %e, "listing failed");
        FetchError::new(account.id.clone(), FetchErrorKind::List, e.to_string())
    })?;

    let summaries: Vec<_> = records
        .into_iter()
        .map(|record| MessageSummary::from_raw(record, &account.id))
        .collect();
    debug!(account = %account.id, %range, count = summaries.len(), "page fetched");

    Ok(FetchOutcome {
        account_id: account.id,
        summaries,
        total,
        range,
    })
}
