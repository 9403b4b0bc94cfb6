//! In-process [`SessionStore`] for local demos and tests.
//!
//! Mirrors the Postgres semantics, including the partial uniqueness of
//! active `(user_id, workshop_id)` records. Seeding helpers are inherent
//! methods so they stay out of the production trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SessionStore;
use crate::auth::AuthError;
use crate::i18n::Message;
use crate::models::auth::{User, UserWithPassword};
use crate::models::session::{Membership, NewSession, Role, SessionRecord, Workshop};

#[derive(Debug, Clone)]
struct MembershipRow {
    user_id: Uuid,
    workshop_id: Uuid,
    role: Role,
    active: bool,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserWithPassword>,
    workshops: HashMap<Uuid, Workshop>,
    // Insertion order doubles as creation order.
    workshop_order: Vec<Uuid>,
    memberships: Vec<MembershipRow>,
    sessions: Vec<SessionRecord>,
}

impl Tables {
    fn upsert(
        &mut self,
        session: &NewSession,
        token_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> SessionRecord {
        for record in self
            .sessions
            .iter_mut()
            .filter(|s| s.user_id == session.user_id && s.active && s.expires_at <= now)
        {
            record.active = false;
        }

        let existing = self.sessions.iter_mut().find(|s| {
            s.active && s.user_id == session.user_id && s.workshop_id == session.workshop_id
        });
        if let Some(record) = existing {
            record.session_token_hash = token_hash.to_string();
            record.ip_address = session.ip_address.clone();
            record.user_agent = session.user_agent.clone();
            record.last_activity = now;
            record.expires_at = expires_at;
            return record.clone();
        }

        let record = SessionRecord {
            id: Uuid::now_v7(),
            user_id: session.user_id,
            workshop_id: session.workshop_id,
            session_token_hash: token_hash.to_string(),
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            last_activity: now,
            expires_at,
            active: true,
            created_at: now,
        };
        self.sessions.push(record.clone());
        record
    }
}

/// Store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a workshop.
    pub async fn add_workshop(&self, name: &str, owner_email: &str, active: bool) -> Workshop {
        let workshop = Workshop {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_email: owner_email.to_string(),
            active,
        };
        let mut tables = self.tables.write().await;
        tables.workshop_order.push(workshop.id);
        tables.workshops.insert(workshop.id, workshop.clone());
        workshop
    }

    /// Flip a workshop's active flag. Returns `false` for unknown ids.
    pub async fn set_workshop_active(&self, workshop_id: Uuid, active: bool) -> bool {
        match self.tables.write().await.workshops.get_mut(&workshop_id) {
            Some(workshop) => {
                workshop.active = active;
                true
            }
            None => false,
        }
    }

    /// Seed or replace a membership.
    pub async fn add_membership(&self, user_id: Uuid, workshop_id: Uuid, role: Role, active: bool) {
        let mut tables = self.tables.write().await;
        tables
            .memberships
            .retain(|m| !(m.user_id == user_id && m.workshop_id == workshop_id));
        tables.memberships.push(MembershipRow {
            user_id,
            workshop_id,
            role,
            active,
        });
    }

    /// Flip a membership's active flag. Returns `false` when there is none.
    pub async fn set_membership_active(&self, user_id: Uuid, workshop_id: Uuid, active: bool) -> bool {
        let mut tables = self.tables.write().await;
        match tables
            .memberships
            .iter_mut()
            .find(|m| m.user_id == user_id && m.workshop_id == workshop_id)
        {
            Some(membership) => {
                membership.active = active;
                true
            }
            None => false,
        }
    }

    /// Overwrite a stored record, e.g. to age it in tests.
    pub async fn put_session(&self, record: SessionRecord) {
        let mut tables = self.tables.write().await;
        match tables.sessions.iter_mut().find(|s| s.id == record.id) {
            Some(existing) => *existing = record,
            None => tables.sessions.push(record),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.user.id == user_id)
            .map(|u| u.user.clone()))
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, AuthError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|u| u.user.email.eq_ignore_ascii_case(email))
        {
            return Err(AuthError::validation(
                Message::EmailTaken,
                format!("email '{email}' already registered"),
            ));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.map(str::to_string),
        };
        tables.users.push(UserWithPassword {
            user: user.clone(),
            password_hash: password_hash.map(str::to_string),
        });
        Ok(user)
    }

    async fn find_workshops_by_owner(&self, email: &str) -> Result<Vec<Workshop>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables
            .workshop_order
            .iter()
            .filter_map(|id| tables.workshops.get(id))
            .filter(|w| w.owner_email.eq_ignore_ascii_case(email))
            .cloned()
            .collect())
    }

    async fn find_memberships(&self, user_id: Uuid) -> Result<Vec<Membership>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                tables.workshops.get(&m.workshop_id).map(|w| Membership {
                    user_id,
                    workshop: w.clone(),
                    role: m.role,
                    active: m.active,
                })
            })
            .collect())
    }

    async fn upsert_session(
        &self,
        session: &NewSession,
        token_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, AuthError> {
        let mut tables = self.tables.write().await;
        Ok(tables.upsert(session, token_hash, now, expires_at))
    }

    async fn invalidate_sessions(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for record in tables
            .sessions
            .iter_mut()
            .filter(|s| s.user_id == user_id && s.active)
        {
            record.active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn rotate_session(
        &self,
        retired_id: Uuid,
        session: &NewSession,
        token_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, AuthError> {
        let mut tables = self.tables.write().await;
        let retired = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == retired_id && s.is_live(now))
            .ok_or_else(|| AuthError::unauthenticated("session is no longer live"))?;
        retired.active = false;
        Ok(tables.upsert(session, token_hash, now, expires_at))
    }

    async fn touch_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for record in tables
            .sessions
            .iter_mut()
            .filter(|s| s.user_id == user_id && s.is_live(now))
        {
            record.last_activity = now;
            record.expires_at = expires_at;
            changed += 1;
        }
        Ok(changed)
    }

    async fn find_live_session_by_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.session_token_hash == token_hash && s.is_live(now))
            .cloned())
    }

    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AuthError> {
        let tables = self.tables.read().await;
        let mut records: Vec<SessionRecord> = tables
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
