//! Type-state IMAP client.
//!
//! ```text
//! NotAuthenticated --login()--> Authenticated --select()--> Selected
//! ```
//!
//! Each state exposes only the commands valid in it; `logout` is available
//! everywhere.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Status, parse_status};
use crate::{Error, Result};

/// IMAP client connection in state `State`.
pub struct Client<S, State> {
    stream: FramedStream<S>,
    tags: TagGenerator,
    state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tags", &self.tags)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Moves the connection into another state.
    fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tags: self.tags,
            state,
        }
    }

    /// Sends a NOOP, mostly useful as a liveness check.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute(&Command::Noop).await.map(|_| ())
    }

    /// Ends the session and shuts the transport down.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tags.next();
        self.stream
            .write_command(&tag, &Command::Logout.serialize()?)
            .await?;

        // The server answers with an untagged BYE before the tagged OK.
        let responses = self.stream.read_until_tagged(&tag).await?;
        let tagged = responses.last().and_then(|r| parse_status(r));
        if let Err(e) = self.stream.shutdown().await {
            debug!(error = %e, "shutdown after LOGOUT failed");
        }

        match tagged {
            Some((_, Status::Ok, _)) => Ok(()),
            Some((_, Status::No, text)) => Err(Error::No(text)),
            Some((_, Status::Bad, text)) => Err(Error::Bad(text)),
            _ => Err(Error::Protocol("unexpected LOGOUT completion".to_string())),
        }
    }

    /// Issues `command` and returns the untagged responses it produced.
    ///
    /// A tagged NO or BAD, or an untagged BYE, becomes an error.
    async fn execute(&mut self, command: &Command) -> Result<Vec<Vec<u8>>> {
        let payload = command.serialize()?;
        let tag = self.tags.next();
        self.stream.write_command(&tag, &payload).await?;

        let mut responses = self.stream.read_until_tagged(&tag).await?;
        let tagged = responses
            .pop()
            .ok_or_else(|| Error::Protocol("missing tagged response".to_string()))?;

        if let Some(text) = responses.iter().find_map(|r| match parse_status(r) {
            Some(("*", Status::Bye, text)) => Some(text),
            _ => None,
        }) {
            return Err(Error::Bye(text));
        }

        match parse_status(&tagged) {
            Some((_, Status::Ok, _)) => Ok(responses),
            Some((_, Status::No, text)) => Err(Error::No(text)),
            Some((_, Status::Bad, text)) => Err(Error::Bad(text)),
            _ => Err(Error::Protocol(format!(
                "unexpected completion: {}",
                String::from_utf8_lossy(&tagged).trim_end()
            ))),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn test_noop_and_logout() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 NOOP\r\n")
            .read(b"A0000 OK NOOP completed\r\n")
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE logging out\r\n")
            .read(b"A0001 OK LOGOUT completed\r\n")
            .build();

        let mut client = Client::from_stream(mock).await.unwrap();
        client.noop().await.unwrap();
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_untagged_bye_is_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 NOOP\r\n")
            .read(b"* BYE idle too long\r\n")
            .read(b"A0000 OK\r\n")
            .build();

        let mut client = Client::from_stream(mock).await.unwrap();
        let err = client.noop().await.unwrap_err();
        assert!(matches!(err, Error::Bye(text) if text == "idle too long"));
    }

    #[tokio::test]
    async fn test_tagged_bad_is_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 NOOP\r\n")
            .read(b"A0000 BAD unknown command\r\n")
            .build();

        let mut client = Client::from_stream(mock).await.unwrap();
        assert!(matches!(client.noop().await, Err(Error::Bad(_))));
    }
}
