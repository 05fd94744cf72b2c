//! # mailfold-core
//!
//! Synchronization and aggregation engine for `mailfold`.
//!
//! This crate provides:
//! - Account records and their `SQLite` store
//! - Credential resolution through the system keyring
//! - The mailbox session seam and its IMAP implementation
//! - Page planning, concurrent per-account fetching and merging
//! - A bounded, unread-first local cache
//! - Progress reporting for a UI
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailfold_core::{ImapConnector, KeyringCredentials, LocalCache, SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::default();
//! let cache = LocalCache::new("mailfold.db", namespace_for("ada"), config.cache_capacity).await?;
//! let engine = SyncEngine::new(
//!     ImapConnector::new(&config.mailbox, config.connect_timeout()),
//!     KeyringCredentials,
//!     cache,
//!     config,
//! );
//! engine.load_cache().await;
//! let report = engine.sync(&accounts, 0, false).await;
//! for error in &report.errors {
//!     eprintln!("{}: {}", error.account_id, error.friendly());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod cache;
pub mod config;
mod error;
pub mod session;
pub mod sync;

pub use account::{
    Account, AccountId, AccountRepository, AccountStore, Credential, CredentialError,
    CredentialProvider, CredentialResult, Endpoint, KeyringCredentials, Secret,
    StaticCredentials, ValidationError, ValidationResult, validate_account,
};
pub use cache::{LocalCache, namespace_for};
pub use config::{SyncConfig, default_database_path};
pub use error::{Error, Result};
pub use session::{
    Flag, ImapConnector, ImapSession, Login, MailboxConnector, MailboxSession, RawRecord,
    SessionError,
};
pub use sync::{
    FetchError, FetchErrorKind, MailboxStats, MessageDate, MessageId, MessageSummary, Progress,
    SequenceRange, SyncEngine, SyncReport, SyncState,
};

pub use mailfold_mime::{DecodedMessage, decode};
