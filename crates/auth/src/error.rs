//! Caller-facing error model.
//!
//! Every failure leaving this crate is an [`AuthError`] with a stable
//! [`ErrorKind`]. Lower layers keep their own error enums and are folded in
//! here; internals (store, hashing, signing) collapse into `ServerError`
//! after being logged.

use serde::Serialize;
use thiserror::Error;

use warden_core::DomainError;

use crate::password::HashingError;
use crate::policy::PolicyViolation;
use crate::store::StoreError;
use crate::token::TokenError;

pub type AuthResult<T> = Result<T, AuthError>;

/// Stable, machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    InvalidEmail,
    Unauthorized,
    UserExists,
    UserNotFound,
    UserDeactivated,
    InvalidCredentials,
    StrictPasswordPolicyViolation,
    DependentUpdateFailed,
    Timeout,
    ServerError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::InvalidEmail => "invalid_email",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::UserExists => "user_exists",
            ErrorKind::UserNotFound => "user_not_found",
            ErrorKind::UserDeactivated => "user_deactivated",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::StrictPasswordPolicyViolation => "strict_password_policy_violation",
            ErrorKind::DependentUpdateFailed => "dependent_update_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServerError => "server_error",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("unauthorized")]
    Unauthorized,

    #[error("user already exists")]
    UserExists,

    #[error("user not found")]
    UserNotFound,

    #[error("user account is deactivated")]
    UserDeactivated,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("password does not satisfy the strict password policy: {0}")]
    StrictPasswordPolicyViolation(PolicyViolation),

    #[error("failed to update records owned by the account")]
    DependentUpdateFailed,

    #[error("deadline exceeded during {0}")]
    Timeout(&'static str),

    #[error("internal server error")]
    ServerError,
}

impl AuthError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Log an internal failure and return the opaque `ServerError`.
    pub fn server(context: &'static str, err: impl core::fmt::Display) -> Self {
        tracing::error!(context, error = %err, "internal failure");
        Self::ServerError
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AuthError::InvalidEmail => ErrorKind::InvalidEmail,
            AuthError::Unauthorized => ErrorKind::Unauthorized,
            AuthError::UserExists => ErrorKind::UserExists,
            AuthError::UserNotFound => ErrorKind::UserNotFound,
            AuthError::UserDeactivated => ErrorKind::UserDeactivated,
            AuthError::InvalidCredentials => ErrorKind::InvalidCredentials,
            AuthError::StrictPasswordPolicyViolation(_) => ErrorKind::StrictPasswordPolicyViolation,
            AuthError::DependentUpdateFailed => ErrorKind::DependentUpdateFailed,
            AuthError::Timeout(_) => ErrorKind::Timeout,
            AuthError::ServerError => ErrorKind::ServerError,
        }
    }

    /// Whether the same call may succeed if the caller tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::DependentUpdateFailed | AuthError::Timeout(_)
        )
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Serializable error shape (`{"error": kind, "message": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
}

impl From<DomainError> for AuthError {
    fn from(value: DomainError) -> Self {
        AuthError::InvalidRequest(value.detail().to_string())
    }
}

impl From<HashingError> for AuthError {
    fn from(value: HashingError) -> Self {
        AuthError::server("password hashing", value)
    }
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => AuthError::UserNotFound,
            StoreError::DuplicateKey(_) => AuthError::UserExists,
            StoreError::DependentWrite(msg) => {
                tracing::error!(error = %msg, "dependent record write failed");
                AuthError::DependentUpdateFailed
            }
            other @ StoreError::Unavailable(_) => AuthError::server("user store", other),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Malformed | TokenError::Expired | TokenError::Revoked => {
                AuthError::Unauthorized
            }
            other @ (TokenError::Signing(_) | TokenError::Revocation(_)) => {
                AuthError::server("session token", other)
            }
        }
    }
}
