//! Account model types.

use serde::{Deserialize, Serialize};

/// Opaque, stable identifier for an account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create an account ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Where an account's mailbox lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Implicit TLS when true; plaintext otherwise.
    pub tls: bool,
}

impl Endpoint {
    /// Creates an implicit-TLS endpoint on port 993.
    #[must_use]
    pub fn tls(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 993,
            tls: true,
        }
    }
}

/// Opaque credential reference.
///
/// Only a [`CredentialProvider`](super::CredentialProvider) can turn this
/// into a usable secret.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wraps an opaque credential value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the opaque value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// A configured mail account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier.
    pub id: AccountId,
    /// Display label, usually the email address.
    pub label: String,
    /// Protocol endpoint.
    pub endpoint: Endpoint,
    /// Login name presented to the server.
    pub username: String,
    /// Opaque identity credential.
    pub credential: Credential,
}

impl Account {
    /// Creates an account that logs in with its label as the username.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        endpoint: Endpoint,
        credential: Credential,
    ) -> Self {
        let label = label.into();
        Self {
            id: AccountId::new(id),
            username: label.clone(),
            label,
            endpoint,
            credential,
        }
    }
}
