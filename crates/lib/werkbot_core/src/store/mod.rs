//! Relational store behind the session resolver.
//!
//! The resolver only needs equality lookups and single-row writes, so the
//! store is a trait object injected at start-up: [`postgres::PgStore`] in
//! production, [`memory::MemoryStore`] for local demos and tests. Policy
//! (which workshop wins, what counts as expired) lives in the resolver, not
//! here.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::models::auth::{User, UserWithPassword};
use crate::models::session::{Membership, NewSession, SessionRecord, Workshop};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Session/tenant persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a user by id.
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AuthError>;

    /// Fetch a user and password hash by e-mail (case-insensitive).
    async fn find_user_by_email(&self, email: &str)
    -> Result<Option<UserWithPassword>, AuthError>;

    /// Create a user. A registered e-mail (case-insensitive) fails with
    /// [`crate::i18n::Message::EmailTaken`].
    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, AuthError>;

    /// All workshops whose owner e-mail matches (case-insensitive), active or
    /// not, oldest first.
    async fn find_workshops_by_owner(&self, email: &str) -> Result<Vec<Workshop>, AuthError>;

    /// All memberships of a user, active or not, oldest first.
    async fn find_memberships(&self, user_id: Uuid) -> Result<Vec<Membership>, AuthError>;

    /// Upsert the active record for `(user_id, workshop_id)`.
    ///
    /// Active records of the user that expired at or before `now` are marked
    /// inactive first, so they are never revived.
    async fn upsert_session(
        &self,
        session: &NewSession,
        token_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, AuthError>;

    /// Mark every active record of the user inactive. Returns rows changed.
    async fn invalidate_sessions(&self, user_id: Uuid) -> Result<u64, AuthError>;

    /// Retire the live record `retired_id` and upsert `session`, atomically.
    ///
    /// Fails with [`AuthError::Unauthenticated`] and changes nothing when
    /// `retired_id` is no longer live, so a record can be rotated only once.
    async fn rotate_session(
        &self,
        retired_id: Uuid,
        session: &NewSession,
        token_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, AuthError>;

    /// Extend last-activity/expiry of the user's live records. Returns rows changed.
    async fn touch_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, AuthError>;

    /// The live record carrying `token_hash`, if any.
    async fn find_live_session_by_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, AuthError>;

    /// Every record of the user, newest first.
    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AuthError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), AuthError>;
}
