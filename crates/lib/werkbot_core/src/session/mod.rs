//! Session resolution: credential → (user, workshop, role), token issuance
//! and the session-record lifecycle.
//!
//! The access token proves *who* is calling. *What* they may do is always
//! recomputed from the ownership/membership relations, never read from the
//! role snapshot inside the token.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::auth::jwt::{ACCESS_TOKEN_EXPIRY_SECS, TokenSigner};
use crate::models::auth::{AccessClaims, TokenPair, User};
use crate::models::session::{NewSession, ResolvedSession, Role, SessionRecord, Workshop};
use crate::store::SessionStore;

/// Session record lifetime, renewed on every authenticated request.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Fixed id of the demo identity.
pub const DEMO_USER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0de0);

/// Resolves credentials and manages session records.
///
/// Holds no mutable state of its own; cloning shares the store handle.
#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
    signer: TokenSigner,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn SessionStore>, signer: TokenSigner) -> Self {
        Self { store, signer }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Resolve an access token to the acting user, workshop and role.
    pub async fn resolve(&self, token: &str) -> Result<ResolvedSession, AuthError> {
        let claims = self.signer.verify_access_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::unauthenticated("token subject is not a user id"))?;
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AuthError::unauthenticated("token subject is unknown"))?;
        self.resolve_user(user).await
    }

    /// Attach the current workshop and role to a known user.
    pub async fn resolve_user(&self, user: User) -> Result<ResolvedSession, AuthError> {
        let (workshop, role) = self.resolve_role(&user).await?;
        debug!(user_id = %user.id, %role, workshop_id = ?workshop.as_ref().map(|w| w.id), "resolved session");
        Ok(ResolvedSession {
            user,
            workshop,
            role,
        })
    }

    /// Ownership of an active workshop first, then an active membership,
    /// else customer without workshop.
    pub async fn resolve_role(&self, user: &User) -> Result<(Option<Workshop>, Role), AuthError> {
        let owned = self.store.find_workshops_by_owner(&user.email).await?;
        if let Some(workshop) = owned.into_iter().find(|w| w.active) {
            return Ok((Some(workshop), Role::Owner));
        }

        let memberships = self.store.find_memberships(user.id).await?;
        if let Some(membership) = memberships.into_iter().find(|m| m.active) {
            return Ok((Some(membership.workshop), membership.role));
        }

        Ok((None, Role::Customer))
    }

    /// Upsert the active session record for `(user_id, workshop_id)`.
    pub async fn create_session(&self, session: NewSession) -> Result<SessionRecord, AuthError> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(SESSION_TTL_HOURS);
        let token_hash = hash_session_token(&session.session_token);
        let record = self
            .store
            .upsert_session(&session, &token_hash, now, expires_at)
            .await?;
        info!(
            user_id = %record.user_id,
            workshop_id = ?record.workshop_id,
            session_id = %record.id,
            "session created"
        );
        Ok(record)
    }

    /// Mark every session of the user inactive. Idempotent.
    pub async fn invalidate_sessions(&self, user_id: Uuid) -> Result<(), AuthError> {
        let changed = self.store.invalidate_sessions(user_id).await?;
        info!(user_id = %user_id, invalidated = changed, "sessions invalidated");
        Ok(())
    }

    /// Extend the user's live sessions by another [`SESSION_TTL_HOURS`].
    pub async fn touch_sessions(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let now = Utc::now();
        self.store
            .touch_sessions(user_id, now, now + Duration::hours(SESSION_TTL_HOURS))
            .await
    }

    /// Every session record of the user, newest first.
    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AuthError> {
        self.store.list_sessions(user_id).await
    }

    /// The live session a refresh token was issued into.
    ///
    /// This is where logout revokes otherwise stateless refresh tokens.
    pub async fn session_for_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<(User, SessionRecord), AuthError> {
        let claims = self.signer.verify_refresh_token(refresh_token)?;
        let record = self
            .store
            .find_live_session_by_token(&hash_session_token(refresh_token), Utc::now())
            .await?
            .ok_or_else(|| AuthError::unauthenticated("refresh token has no live session"))?;
        if record.user_id.to_string() != claims.sub {
            return Err(AuthError::unauthenticated("refresh token subject mismatch"));
        }
        let user = self
            .store
            .find_user(record.user_id)
            .await?
            .ok_or_else(|| AuthError::unauthenticated("refresh token subject is unknown"))?;
        Ok((user, record))
    }

    /// Replace session `retired_id` with `session` (refresh-token rotation).
    ///
    /// Only one rotation of a record succeeds; a replay gets
    /// [`AuthError::Unauthenticated`].
    pub async fn rotate_session(
        &self,
        retired_id: Uuid,
        session: NewSession,
    ) -> Result<SessionRecord, AuthError> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(SESSION_TTL_HOURS);
        let token_hash = hash_session_token(&session.session_token);
        let record = self
            .store
            .rotate_session(retired_id, &session, &token_hash, now, expires_at)
            .await?;
        info!(
            user_id = %record.user_id,
            retired_session_id = %retired_id,
            session_id = %record.id,
            "session rotated"
        );
        Ok(record)
    }

    /// Sign a 24 h access token and a 7 day refresh token. No side effects.
    pub fn issue_tokens(
        &self,
        user: &User,
        workshop: Option<&Workshop>,
        role: Role,
    ) -> Result<TokenPair, AuthError> {
        let claims = AccessClaims::new(
            user.id,
            user.email.clone(),
            role,
            Utc::now(),
            Duration::seconds(ACCESS_TOKEN_EXPIRY_SECS),
        )
        .with_workshop(workshop);
        let access_token = self.signer.sign_access(&claims)?;
        let (refresh_token, _) = self.signer.issue_refresh_token(user.id)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_EXPIRY_SECS,
            token_type: "Bearer".to_string(),
        })
    }
}

/// Fixed customer identity used only when demo mode is switched on.
pub fn demo_session() -> ResolvedSession {
    ResolvedSession {
        user: User {
            id: DEMO_USER_ID,
            email: "demo@werkbot.invalid".to_string(),
            name: Some("Demo".to_string()),
        },
        workshop: None,
        role: Role::Customer,
    }
}

/// Extract the token from an `Authorization` header value (`Bearer <token>`).
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::unauthenticated("malformed authorization header"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::unauthenticated("invalid authorization scheme"));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::unauthenticated("empty bearer token"));
    }
    Ok(token)
}

/// SHA-256 hex digest under which opaque session tokens are stored.
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
