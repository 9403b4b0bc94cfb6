//! Authentication and authorization logic.
//!
//! Provides password hashing and JWT issuance/verification shared by
//! `werkbot_api` and `werkbot_cli`.

pub mod jwt;
pub mod password;

use thiserror::Error;

use crate::i18n::Message;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed, invalid or expired credential. The payload is for
    /// server-side logs only.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Invalid credentials")]
    CredentialError,

    #[error("Validation error: {detail}")]
    Validation { message: Message, detail: String },

    #[error("Too many attempts, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        AuthError::Unauthenticated(reason.into())
    }

    pub fn validation(message: Message, detail: impl Into<String>) -> Self {
        AuthError::Validation {
            message,
            detail: detail.into(),
        }
    }
}
