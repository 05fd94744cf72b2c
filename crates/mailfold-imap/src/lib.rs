//! # mailfold-imap
//!
//! A small async IMAP4rev1 client covering what mailbox synchronization
//! needs: connect (implicit TLS or plain), LOGIN, SELECT, header FETCH by
//! sequence range, UID STORE of flags, UID FETCH of the raw message and
//! LOGOUT.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailfold_imap::{Client, Config, connect};
//!
//! #[tokio::main]
//! async fn main() -> mailfold_imap::Result<()> {
//!     let stream = connect(&Config::new("imap.example.com")).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client.login("user@example.com", "password").await?;
//!     let mut inbox = client.select("INBOX").await?;
//!
//!     let last = inbox.exists();
//!     let first = last.saturating_sub(9).max(1);
//!     for message in inbox.fetch_headers(first..=last, &["Subject", "From", "Date"]).await? {
//!         println!("{:?} {:?}", message.uid, message.flags);
//!     }
//!
//!     inbox.logout().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login() ──> Authenticated ── select() ──> Selected
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;

pub use command::{Command, StoreAction, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, FramedStream, ImapStream, NotAuthenticated, Security, Selected,
    connect,
};
pub use error::{Error, Result};
pub use parser::{FetchResponse, Status};

/// The `\Seen` system flag.
pub const SEEN: &str = "\\Seen";
