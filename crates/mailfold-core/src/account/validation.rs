//! Account validation.

use super::model::Account;

/// Validation error for account configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Account id is empty.
    EmptyId,
    /// Label is empty.
    EmptyLabel,
    /// Host is empty.
    EmptyHost,
    /// Port is zero.
    InvalidPort,
    /// Username is empty.
    EmptyUsername,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyId => "Account id is required",
            Self::EmptyLabel => "Account label is required",
            Self::EmptyHost => "Mail server is required",
            Self::InvalidPort => "Port must be 1-65535",
            Self::EmptyUsername => "Username is required",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyId => "id",
            Self::EmptyLabel => "label",
            Self::EmptyHost => "host",
            Self::InvalidPort => "port",
            Self::EmptyUsername => "username",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field(), self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating an account.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate an account, collecting every problem.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_account(account: &Account) -> ValidationResult {
    let mut errors = Vec::new();

    if account.id.as_str().trim().is_empty() {
        errors.push(ValidationError::EmptyId);
    }
    if account.label.trim().is_empty() {
        errors.push(ValidationError::EmptyLabel);
    }
    if account.endpoint.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if account.endpoint.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }
    if account.username.trim().is_empty() {
        errors.push(ValidationError::EmptyUsername);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
