//! IMAP-backed sessions.

use std::ops::RangeInclusive;
use std::time::Duration;

use mailfold_imap::{Client, Config, ImapStream, Security, Selected, StoreAction};
use mailfold_mime::Headers;
use tracing::debug;

use super::{Flag, Login, MailboxConnector, MailboxSession, RawRecord, SessionError};
use crate::account::Endpoint;

/// Header fields requested for every listed message.
const SUMMARY_FIELDS: &[&str] = &["Subject", "From", "Date"];

impl From<mailfold_imap::Error> for SessionError {
    fn from(error: mailfold_imap::Error) -> Self {
        use mailfold_imap::Error;
        match error {
            Error::Auth(text) => Self::Auth(text),
            Error::Timeout(after) => Self::Timeout(after),
            Error::Io(e) => Self::Connect(e.to_string()),
            Error::Tls(e) => Self::Connect(e.to_string()),
            Error::InvalidDnsName(e) => Self::Connect(e.to_string()),
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Opens IMAP sessions with one mailbox selected.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    mailbox: String,
    connect_timeout: Duration,
}

impl ImapConnector {
    /// Creates a connector selecting `mailbox` on every session.
    #[must_use]
    pub fn new(mailbox: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            mailbox: mailbox.into(),
            connect_timeout,
        }
    }
}

impl MailboxConnector for ImapConnector {
    type Session = ImapSession;

    async fn connect(&self, endpoint: &Endpoint, login: &Login) -> Result<ImapSession, SessionError> {
        let config = Config::new(endpoint.host.clone())
            .with_port(endpoint.port)
            .with_security(Security::from_tls_flag(endpoint.tls))
            .with_connect_timeout(self.connect_timeout);

        let stream = mailfold_imap::connect(&config).await?;
        let client = Client::from_stream(stream).await?;
        let client = client
            .login(&login.username, login.secret.expose())
            .await?;
        let client = client.select(&self.mailbox).await?;

        Ok(ImapSession { client })
    }
}

/// An authenticated IMAP connection with the mailbox selected.
#[derive(Debug)]
pub struct ImapSession {
    client: Client<ImapStream, Selected>,
}

impl MailboxSession for ImapSession {
    fn total(&self) -> u32 {
        self.client.exists()
    }

    async fn list(&mut self, range: RangeInclusive<u32>) -> Result<Vec<RawRecord>, SessionError> {
        let fetched = self.client.fetch_headers(range, SUMMARY_FIELDS).await?;

        let mut records = Vec::with_capacity(fetched.len());
        for message in fetched {
            let Some(remote_id) = message.uid else {
                debug!(seq = message.seq, "FETCH response without UID skipped");
                continue;
            };

            let headers = message
                .header
                .as_deref()
                .map(|raw| Headers::parse(&String::from_utf8_lossy(raw)))
                .unwrap_or_default();

            records.push(RawRecord {
                remote_id,
                subject: headers.get_decoded("subject"),
                from: headers.get_decoded("from"),
                date: headers.get("date").map(ToString::to_string),
                flags: message.flags.unwrap_or_default(),
            });
        }
        Ok(records)
    }

    async fn set_flag(&mut self, remote_id: u32, flag: Flag, add: bool) -> Result<(), SessionError> {
        let action = if add {
            StoreAction::Add
        } else {
            StoreAction::Remove
        };
        self.client
            .uid_store(remote_id, action, &[flag.as_str()])
            .await?;
        Ok(())
    }

    async fn fetch_raw(&mut self, remote_id: u32) -> Result<Vec<u8>, SessionError> {
        self.client
            .uid_fetch_body(remote_id)
            .await?
            .ok_or(SessionError::NotFound(remote_id))
    }

    async fn close(self) {
        if let Err(e) = self.client.logout().await {
            debug!(error = %e, "logout failed");
        }
    }
}
