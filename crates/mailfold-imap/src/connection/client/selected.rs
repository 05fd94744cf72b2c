//! Commands valid with a mailbox selected.

use std::ops::RangeInclusive;

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::Selected;
use crate::Result;
use crate::command::{Command, StoreAction};
use crate::parser::{FetchResponse, parse_exists, parse_fetch};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the selected mailbox name.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Returns the message count from SELECT, updated by later EXISTS.
    #[must_use]
    pub const fn exists(&self) -> u32 {
        self.state.exists
    }

    /// Fetches UID, FLAGS and the named header fields for a sequence range.
    ///
    /// Unsolicited FETCH responses for messages outside `range` are dropped.
    pub async fn fetch_headers(
        &mut self,
        range: RangeInclusive<u32>,
        fields: &[&str],
    ) -> Result<Vec<FetchResponse>> {
        let command = Command::FetchHeaders {
            range: range.clone(),
            fields: fields.iter().map(ToString::to_string).collect(),
        };
        let responses = self.execute(&command).await?;
        self.track_exists(&responses);

        let mut fetched = Vec::with_capacity(responses.len());
        for response in &responses {
            if let Some(fetch) = parse_fetch(response)?
                && range.contains(&fetch.seq)
            {
                fetched.push(fetch);
            }
        }
        Ok(fetched)
    }

    /// Adds or removes flags on the message with `uid`.
    pub async fn uid_store(&mut self, uid: u32, action: StoreAction, flags: &[&str]) -> Result<()> {
        let command = Command::UidStore {
            uid,
            action,
            flags: flags.iter().map(ToString::to_string).collect(),
        };
        let responses = self.execute(&command).await?;
        self.track_exists(&responses);
        Ok(())
    }

    /// Downloads the raw message with `uid`, or `None` if it no longer exists.
    pub async fn uid_fetch_body(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let responses = self.execute(&Command::UidFetchBody(uid)).await?;
        self.track_exists(&responses);

        for response in &responses {
            if let Some(fetch) = parse_fetch(response)?
                && fetch.uid == Some(uid)
                && fetch.body.is_some()
            {
                return Ok(fetch.body);
            }
        }
        Ok(None)
    }

    fn track_exists(&mut self, responses: &[Vec<u8>]) {
        if let Some(exists) = responses.iter().rev().find_map(|r| parse_exists(r)) {
            self.state.exists = exists;
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
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::Error;

    const FIELDS: &[&str] = &["Subject", "From", "Date"];

    async fn selected(mock: Mock) -> Client<Mock, Selected> {
        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("u", "p").await.unwrap();
        client.select("INBOX").await.unwrap()
    }

    fn preamble() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN \"u\" \"p\"\r\n")
            .read(b"A0000 OK\r\n")
            .write(b"A0001 SELECT \"INBOX\"\r\n")
            .read(b"* 2 EXISTS\r\n")
            .read(b"A0001 OK [READ-WRITE] done\r\n");
        builder
    }

    #[tokio::test]
    async fn test_fetch_headers() {
        let mock = preamble()
            .write(b"A0002 FETCH 1:2 (UID FLAGS BODY.PEEK[HEADER.FIELDS (SUBJECT FROM DATE)])\r\n")
            .read(b"* 1 FETCH (UID 10 FLAGS (\\Seen) BODY[HEADER.FIELDS (SUBJECT FROM DATE)] {14}\r\n")
            .read(b"Subject: one\r\n)\r\n")
            .read(b"* 2 FETCH (UID 11 FLAGS () BODY[HEADER.FIELDS (SUBJECT FROM DATE)] {14}\r\n")
            .read(b"Subject: two\r\n)\r\n")
            .read(b"* 9 FETCH (FLAGS (\\Deleted))\r\n")
            .read(b"A0002 OK FETCH completed\r\n")
            .build();

        let mut client = selected(mock).await;
        assert_eq!(client.exists(), 2);

        let fetched = client.fetch_headers(1..=2, FIELDS).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].uid, Some(10));
        assert_eq!(fetched[0].flags, Some(vec!["\\Seen".to_string()]));
        assert_eq!(fetched[1].header.as_deref(), Some(&b"Subject: two\r\n"[..]));
    }

    #[tokio::test]
    async fn test_fetch_tracks_new_exists() {
        let mock = preamble()
            .write(b"A0002 FETCH 2:2 (UID FLAGS BODY.PEEK[HEADER.FIELDS (SUBJECT)])\r\n")
            .read(b"* 3 EXISTS\r\n")
            .read(b"A0002 OK\r\n")
            .build();

        let mut client = selected(mock).await;
        let fetched = client.fetch_headers(2..=2, &["Subject"]).await.unwrap();
        assert!(fetched.is_empty());
        assert_eq!(client.exists(), 3);
    }

    #[tokio::test]
    async fn test_uid_store() {
        let mock = preamble()
            .write(b"A0002 UID STORE 11 +FLAGS.SILENT (\\Seen)\r\n")
            .read(b"A0002 OK STORE completed\r\n")
            .build();

        let mut client = selected(mock).await;
        client
            .uid_store(11, StoreAction::Add, &["\\Seen"])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_uid_store_rejected() {
        let mock = preamble()
            .write(b"A0002 UID STORE 11 -FLAGS.SILENT (\\Seen)\r\n")
            .read(b"A0002 NO read-only mailbox\r\n")
            .build();

        let mut client = selected(mock).await;
        let result = client.uid_store(11, StoreAction::Remove, &["\\Seen"]).await;
        assert!(matches!(result, Err(Error::No(_))));
    }

    #[tokio::test]
    async fn test_uid_fetch_body() {
        let mock = preamble()
            .write(b"A0002 UID FETCH 11 (UID BODY.PEEK[])\r\n")
            .read(b"* 2 FETCH (UID 11 BODY[] {9}\r\n")
            .read(b"Hi\r\n\r\nYo!)\r\n")
            .read(b"A0002 OK\r\n")
            .build();

        let mut client = selected(mock).await;
        let body = client.uid_fetch_body(11).await.unwrap();
        assert_eq!(body.as_deref(), Some(&b"Hi\r\n\r\nYo!"[..]));
    }

    #[tokio::test]
    async fn test_uid_fetch_body_expunged() {
        let mock = preamble()
            .write(b"A0002 UID FETCH 99 (UID BODY.PEEK[])\r\n")
            .read(b"A0002 OK\r\n")
            .build();

        let mut client = selected(mock).await;
        assert_eq!(client.uid_fetch_body(99).await.unwrap(), None);
    }
}
