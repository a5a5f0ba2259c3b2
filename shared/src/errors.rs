//! Error types shared across the Mahiberawi services

use thiserror::Error;

/// Authentication and authorization failures
///
/// Every variant except [`AuthError::Forbidden`] means "the caller is not
/// authenticated". Callers that only need to tell a client to refresh can
/// match on [`AuthError::TokenExpired`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account no longer exists")]
    UnknownAccount,

    #[error("Insufficient role")]
    Forbidden,
}

impl AuthError {
    /// True when the caller is authenticated but lacks the required role
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::Forbidden)
    }
}

/// A role string outside the known set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);
