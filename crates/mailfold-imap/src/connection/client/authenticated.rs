//! Mailbox selection.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authenticated, Selected};
use crate::Result;
use crate::command::Command;
use crate::parser::parse_exists;

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Selects `mailbox` read-write.
    pub async fn select(mut self, mailbox: &str) -> Result<Client<S, Selected>> {
        let responses = self.execute(&Command::Select(mailbox.to_string())).await?;
        let exists = responses
            .iter()
            .rev()
            .find_map(|r| parse_exists(r))
            .unwrap_or(0);

        debug!(mailbox, exists, "selected");
        Ok(self.transition(Selected {
            mailbox: mailbox.to_string(),
            exists,
        }))
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
    use crate::Error;

    #[tokio::test]
    async fn test_select_reports_exists() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN \"u\" \"p\"\r\n")
            .read(b"A0000 OK\r\n")
            .write(b"A0001 SELECT \"INBOX\"\r\n")
            .read(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n")
            .read(b"* 172 EXISTS\r\n")
            .read(b"* 1 RECENT\r\n")
            .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
            .read(b"A0001 OK [READ-WRITE] SELECT completed\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("u", "p").await.unwrap();
        let selected = client.select("INBOX").await.unwrap();

        assert_eq!(selected.state.mailbox(), "INBOX");
        assert_eq!(selected.state.exists(), 172);
    }

    #[tokio::test]
    async fn test_select_missing_mailbox() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN \"u\" \"p\"\r\n")
            .read(b"A0000 OK\r\n")
            .write(b"A0001 SELECT \"Nope\"\r\n")
            .read(b"A0001 NO Mailbox doesn't exist\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("u", "p").await.unwrap();
        assert!(matches!(client.select("Nope").await, Err(Error::No(_))));
    }
}
