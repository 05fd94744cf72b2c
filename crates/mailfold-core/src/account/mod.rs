//! Accounts: model, storage, validation and credential resolution.

mod credentials;
mod model;
mod repository;
mod validation;

pub use credentials::{
    CredentialError, CredentialProvider, CredentialResult, KeyringCredentials, Secret,
    StaticCredentials,
};
pub use model::{Account, AccountId, Credential, Endpoint};
pub use repository::{AccountRepository, AccountStore};
pub use validation::{ValidationError, ValidationResult, validate_account};
