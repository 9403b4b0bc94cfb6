//! Authentication domain models.
//!
//! These are internal domain models; the HTTP layer wraps them in its own
//! request/response envelopes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::{Role, Workshop};

/// Domain user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

/// User with password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: Option<String>,
}

/// Discriminates access from refresh tokens so one can never stand in for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims embedded in access tokens.
///
/// `role` and `workshop_id` are a snapshot taken at issuance. They are
/// informational only; authorization is always recomputed from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: user ID.
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub workshop_id: Option<Uuid>,
    pub workshop_name: Option<String>,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub typ: TokenType,
    /// Set only on demo identities.
    #[serde(default, skip_serializing_if = "is_false")]
    pub mock: bool,
}

impl AccessClaims {
    /// Claims for `user_id` valid for `lifetime` starting at `now`.
    pub fn new(
        user_id: Uuid,
        email: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            email: email.into(),
            role,
            workshop_id: None,
            workshop_name: None,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            iss: crate::auth::jwt::ISSUER.to_string(),
            aud: crate::auth::jwt::AUDIENCE.to_string(),
            typ: TokenType::Access,
            mock: false,
        }
    }

    pub fn with_workshop(mut self, workshop: Option<&Workshop>) -> Self {
        self.workshop_id = workshop.map(|w| w.id);
        self.workshop_name = workshop.map(|w| w.name.clone());
        self
    }

    pub fn mock(mut self) -> Self {
        self.mock = true;
        self
    }
}

/// JWT claims embedded in refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    /// Unique token id.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub typ: TokenType,
}

/// Freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub token_type: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}
