//! JWT token generation and verification.

use std::fmt;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::de::DeserializeOwned;
use tracing::warn;
use uuid::Uuid;

use super::AuthError;
use crate::environment::Environment;
use crate::models::auth::{AccessClaims, RefreshClaims, TokenType};

/// `iss` claim of every token this service issues.
pub const ISSUER: &str = "werkbot";

/// `aud` claim of every token this service issues.
pub const AUDIENCE: &str = "werkbot-api";

/// Access token lifetime: 24 hours.
pub const ACCESS_TOKEN_EXPIRY_SECS: i64 = 24 * 60 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// Signing key used outside production when no secret is configured.
const DEV_SIGNING_SECRET: &str = "werkbot-development-only-signing-secret-do-not-deploy";

/// HS256 signer/verifier bound to this service's issuer and audience.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Sign prepared access claims.
    pub fn sign_access(&self, claims: &AccessClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Issue a 7-day refresh token with a random `jti`.
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<(String, RefreshClaims), AuthError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS)).timestamp(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            typ: TokenType::Refresh,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))?;
        Ok((token, claims))
    }

    /// Verify an access token's signature, expiry, issuer, audience and type.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let claims: AccessClaims = self.decode(token)?;
        if claims.typ != TokenType::Access {
            return Err(AuthError::unauthenticated("not an access token"));
        }
        Ok(claims)
    }

    /// Verify a refresh token's signature, expiry, issuer, audience and type.
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let claims: RefreshClaims = self.decode(token)?;
        if claims.typ != TokenType::Refresh {
            return Err(AuthError::unauthenticated("not a refresh token"));
        }
        Ok(claims)
    }

    fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        decode::<T>(token, &self.decoding, &validation())
            .map(|data| data.claims)
            .map_err(|e| AuthError::unauthenticated(format!("jwt decode: {e}")))
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);
    validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
    validation
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → development key.
///
/// Fails in production when neither variable is set.
pub fn resolve_jwt_secret(environment: Environment) -> Result<String, AuthError> {
    select_jwt_secret(
        std::env::var("JWT_SECRET").ok(),
        std::env::var("AUTH_SECRET").ok(),
        environment,
    )
}

/// Pick the signing secret from the configured candidates.
pub fn select_jwt_secret(
    jwt_secret: Option<String>,
    auth_secret: Option<String>,
    environment: Environment,
) -> Result<String, AuthError> {
    let non_blank = |s: &String| !s.trim().is_empty();
    if let Some(secret) = jwt_secret.filter(non_blank).or(auth_secret.filter(non_blank)) {
        return Ok(secret);
    }
    if environment.is_production() {
        return Err(AuthError::Configuration(
            "JWT_SECRET must be set in production".into(),
        ));
    }
    warn!(%environment, "no JWT_SECRET configured, using the development signing key");
    Ok(DEV_SIGNING_SECRET.to_string())
}

/// Generate a random 64-character alphanumeric secret suitable for `JWT_SECRET`.
pub fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}
