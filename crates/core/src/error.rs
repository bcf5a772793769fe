//! Errors raised while parsing or checking identity values.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Input rejected before any IO happened.
///
/// Storage and crypto failures have their own error types in `warden-auth`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed field value (role, email, ...).
    #[error("invalid value: {0}")]
    Validation(String),

    /// Unparseable `UserId` / `TokenId` / `ProjectId`.
    #[error("malformed id: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Caller-facing text without the variant prefix.
    pub fn detail(&self) -> &str {
        match self {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => msg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_drops_the_prefix() {
        let err = DomainError::validation("role must be one of: user, admin");
        assert_eq!(err.detail(), "role must be one of: user, admin");
        assert_eq!(err.to_string(), "invalid value: role must be one of: user, admin");
    }
}
