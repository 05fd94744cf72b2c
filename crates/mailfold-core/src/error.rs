//! Error types for the core library.

use thiserror::Error;

use crate::session::SessionError;

/// Errors that can occur in core operations.
///
/// Sync rounds never fail with this type; per-account problems are reported
/// as [`FetchError`](crate::sync::FetchError) values in the round's report.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::account::CredentialError),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Message is not held in sync state.
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// A session could not be opened for an account.
    #[error(transparent)]
    Fetch(#[from] crate::sync::FetchError),

    /// A mailbox session operation failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
