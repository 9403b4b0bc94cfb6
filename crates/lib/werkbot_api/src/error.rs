//! Application error types.
//!
//! Responses are first rendered in the default locale. The rendered
//! [`ErrorRender`] is attached as a response extension so
//! [`crate::middleware::locale::localize_errors`] can re-render the body in
//! the configured locale.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};
use werkbot_core::auth::AuthError;
use werkbot_core::i18n::{Locale, Message};

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {detail}")]
    Validation { message: Message, detail: String },

    #[error("Rate limited for {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn validation(detail: impl Into<String>) -> Self {
        AppError::Validation {
            message: Message::InvalidRequest,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Persistence(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Catalog entry shown to the client.
    pub fn message(&self) -> Message {
        match self {
            AppError::Unauthenticated(_) => Message::Unauthenticated,
            AppError::InvalidCredentials => Message::InvalidCredentials,
            AppError::Forbidden(_) => Message::Forbidden,
            AppError::Validation { message, .. } => *message,
            AppError::RateLimited { .. } => Message::RateLimited,
            AppError::Persistence(_) => Message::PersistenceFailure,
            AppError::Internal(_) => Message::InternalError,
        }
    }

    /// Detail safe to show the client. Only validation failures carry one.
    fn public_detail(&self) -> Option<String> {
        match self {
            AppError::Validation { detail, .. } => Some(detail.clone()),
            _ => None,
        }
    }
}

/// What the locale middleware needs to re-render an error body.
#[derive(Debug, Clone)]
pub struct ErrorRender {
    pub message: Message,
    pub details: Option<String>,
}

impl ErrorRender {
    pub fn body(&self, locale: Locale) -> ErrorResponse {
        ErrorResponse {
            error: self.message.text(locale).to_string(),
            details: self.details.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Persistence(e) => error!(error = %e, "store failure"),
            AppError::Internal(e) => error!(error = %e, "internal error"),
            AppError::Unauthenticated(reason) => warn!(%reason, "request rejected"),
            AppError::Forbidden(reason) => warn!(%reason, "request forbidden"),
            _ => {}
        }

        let render = ErrorRender {
            message: self.message(),
            details: self.public_detail(),
        };
        let mut response = (status, Json(render.body(Locale::default()))).into_response();
        if let AppError::RateLimited { retry_after_secs } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response.extensions_mut().insert(render);
        response
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthenticated(reason) => AppError::Unauthenticated(reason),
            AuthError::CredentialError => AppError::InvalidCredentials,
            AuthError::Validation { message, detail } => AppError::Validation { message, detail },
            AuthError::RateLimited { retry_after_secs } => {
                AppError::RateLimited { retry_after_secs }
            }
            AuthError::Persistence(e) => AppError::Persistence(e.to_string()),
            AuthError::Configuration(msg) | AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_500_without_detail() {
        let err = AppError::from(AuthError::Persistence(sqlx::Error::PoolTimedOut));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), Message::PersistenceFailure);
        assert!(err.public_detail().is_none());
    }

    #[test]
    fn rate_limit_sets_retry_after() {
        let response = AppError::RateLimited {
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "42");
        assert!(response.extensions().get::<ErrorRender>().is_some());
    }

    #[test]
    fn validation_keeps_its_message() {
        let err = AppError::from(AuthError::validation(Message::EmailTaken, "dup"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), Message::EmailTaken);
    }
}
