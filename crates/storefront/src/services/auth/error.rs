//! Authentication error types.

use thiserror::Error;

use super::tokens::TokenError;
use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] shopfront_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid email or password")]
    InvalidCredentials,

    /// User already exists.
    #[error("an account with this email already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Display name missing or too long.
    #[error("{0}")]
    InvalidName(String),

    /// Refresh token unknown, revoked, expired, or malformed.
    #[error("session expired, please sign in again")]
    InvalidToken,

    /// The refresh token was rotated moments ago by a concurrent request.
    ///
    /// The caller should keep its cookies; the other request's response
    /// carries the new pair.
    #[error("session is being refreshed by another request")]
    StaleRefresh,

    /// Token signing failed.
    #[error("token error: {0}")]
    Token(TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

impl AuthError {
    /// Whether the failure is the caller's fault rather than the server's.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Token(_) | Self::Repository(_) | Self::PasswordHash
        )
    }
}
