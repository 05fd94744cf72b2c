//! Credential resolution.
//!
//! Accounts carry an opaque [`Credential`]; a [`CredentialProvider`] turns it
//! into a [`Secret`] only at the moment a session is opened. The secret is
//! never persisted or logged.

use std::collections::HashMap;

use keyring::Entry;
use tracing::debug;

use super::{AccountId, Credential};

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailfold";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// No secret is stored for the credential.
    #[error("No secret stored for this credential")]
    Missing,
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// A decrypted secret. `Debug` output is redacted.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    /// Wraps a plaintext secret.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the plaintext for the duration of a login.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Turns opaque credentials into secrets.
pub trait CredentialProvider: Send + Sync + 'static {
    /// Resolves `credential` to its plaintext secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot be retrieved.
    fn decrypt(&self, credential: &Credential) -> CredentialResult<Secret>;
}

/// Secrets held in the platform keyring.
///
/// A credential is the keyring entry name.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyringCredentials;

impl KeyringCredentials {
    /// Returns the credential under which `account_id`'s password is stored.
    #[must_use]
    pub fn credential_for(account_id: &AccountId) -> Credential {
        Credential::new(format!("{SERVICE_NAME}_imap_{account_id}"))
    }

    /// Stores `password` for `credential`.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring operation fails.
    pub fn store(credential: &Credential, password: &str) -> CredentialResult<()> {
        Entry::new(SERVICE_NAME, credential.as_str())?.set_password(password)?;
        debug!("stored secret in keyring");
        Ok(())
    }

    /// Deletes the secret for `credential`; a missing entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyring operation fails.
    pub fn delete(credential: &Credential) -> CredentialResult<()> {
        match Entry::new(SERVICE_NAME, credential.as_str())?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CredentialProvider for KeyringCredentials {
    fn decrypt(&self, credential: &Credential) -> CredentialResult<Secret> {
        let entry = Entry::new(SERVICE_NAME, credential.as_str())?;
        match entry.get_password() {
            Ok(password) => Ok(Secret::new(password)),
            Err(keyring::Error::NoEntry) => Err(CredentialError::Missing),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory secrets keyed by credential.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    secrets: HashMap<Credential, Secret>,
}

impl StaticCredentials {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret for `credential`.
    #[must_use]
    pub fn with(mut self, credential: Credential, secret: impl Into<String>) -> Self {
        self.secrets.insert(credential, Secret::new(secret));
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn decrypt(&self, credential: &Credential) -> CredentialResult<Secret> {
        self.secrets
            .get(credential)
            .cloned()
            .ok_or(CredentialError::Missing)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_for_account() {
        let credential = KeyringCredentials::credential_for(&AccountId::new("42"));
        assert_eq!(credential.as_str(), "mailfold_imap_42");
    }

    #[test]
    fn test_static_credentials() {
        let provider = StaticCredentials::new().with(Credential::new("a"), "pw");
        assert_eq!(provider.decrypt(&Credential::new("a")).unwrap().expose(), "pw");
        assert!(matches!(
            provider.decrypt(&Credential::new("b")),
            Err(CredentialError::Missing)
        ));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        assert_eq!(format!("{:?}", Secret::new("hunter2")), "Secret(..)");
    }
}
