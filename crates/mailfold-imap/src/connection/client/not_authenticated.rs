//! Greeting and LOGIN.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::parser::{Status, parse_status};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream and reads the server greeting.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        let greeting = framed.read_response().await?;

        match parse_status(&greeting) {
            Some(("*", Status::Ok | Status::PreAuth, _)) => {}
            Some(("*", Status::Bye, text)) => return Err(Error::Bye(text)),
            _ => {
                return Err(Error::Protocol(format!(
                    "unexpected greeting: {}",
                    String::from_utf8_lossy(&greeting).trim_end()
                )));
            }
        }

        Ok(Self {
            stream: framed,
            tags: TagGenerator::default(),
            state: NotAuthenticated,
        })
    }

    /// Authenticates with LOGIN.
    ///
    /// A NO completion is reported as [`Error::Auth`].
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };

        match self.execute(&command).await {
            Ok(_) => {
                debug!("authenticated");
                Ok(self.transition(Authenticated))
            }
            Err(Error::No(text)) => Err(Error::Auth(text)),
            Err(e) => Err(e),
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
    async fn test_greeting_bye() {
        let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Bye(_)));
    }

    #[tokio::test]
    async fn test_greeting_garbage() {
        let mock = Builder::new().read(b"HTTP/1.1 400 Bad Request\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_login_success() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
            .write(b"A0000 LOGIN \"user\" \"secret\"\r\n")
            .read(b"A0000 OK LOGIN completed\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        client.login("user", "secret").await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejected_is_auth_error() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN \"user\" \"wrong\"\r\n")
            .read(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let err = client.login("user", "wrong").await.unwrap_err();
        assert!(err.is_auth());
    }
}
