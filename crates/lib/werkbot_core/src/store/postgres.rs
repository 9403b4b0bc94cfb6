//! PostgreSQL-backed [`SessionStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::SessionStore;
use crate::auth::AuthError;
use crate::i18n::Message;
use crate::models::auth::{User, UserWithPassword};
use crate::models::session::{Membership, NewSession, Role, SessionRecord, Workshop};

const SESSION_COLUMNS: &str = "id, user_id, workshop_id, session_token_hash, ip_address, \
     user_agent, last_activity, expires_at, active, created_at";

/// Store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
            "SELECT id, email, name FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, email, name)| User { id, email, name }))
    }

    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<String>, Option<String>)>(
            "SELECT id, email, name, password_hash FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, email, name, password_hash)| UserWithPassword {
            user: User { id, email, name },
            password_hash,
        }))
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, AuthError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| email_taken_or(e, email))?;
        Ok(User {
            id,
            email: email.to_string(),
            name: name.map(str::to_string),
        })
    }

    async fn find_workshops_by_owner(&self, email: &str) -> Result<Vec<Workshop>, AuthError> {
        let rows = sqlx::query_as::<_, Workshop>(
            "SELECT id, name, owner_email, active FROM workshops \
             WHERE lower(owner_email) = lower($1) \
             ORDER BY created_at ASC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_memberships(&self, user_id: Uuid) -> Result<Vec<Membership>, AuthError> {
        let rows = sqlx::query_as::<_, (String, bool, Uuid, String, String, bool)>(
            "SELECT m.role, m.active, w.id, w.name, w.owner_email, w.active \
             FROM workshop_memberships m \
             JOIN workshops w ON w.id = m.workshop_id \
             WHERE m.user_id = $1 \
             ORDER BY m.created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(role, active, id, name, owner_email, workshop_active)| {
                let role = role.parse::<Role>().map_err(AuthError::Internal)?;
                Ok(Membership {
                    user_id,
                    workshop: Workshop {
                        id,
                        name,
                        owner_email,
                        active: workshop_active,
                    },
                    role,
                    active,
                })
            })
            .collect()
    }

    async fn upsert_session(
        &self,
        session: &NewSession,
        token_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, AuthError> {
        let mut tx = self.pool.begin().await?;
        let record = upsert_in(&mut *tx, session, token_hash, now, expires_at).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn invalidate_sessions(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let result = sqlx::query("UPDATE sessions SET active = false WHERE user_id = $1 AND active")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn rotate_session(
        &self,
        retired_id: Uuid,
        session: &NewSession,
        token_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRecord, AuthError> {
        let mut tx = self.pool.begin().await?;

        // A concurrent rotation of the same row blocks here, then sees it inactive.
        let retired = sqlx::query(
            "UPDATE sessions SET active = false \
             WHERE id = $1 AND active AND expires_at > $2",
        )
        .bind(retired_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if retired.rows_affected() == 0 {
            return Err(AuthError::unauthenticated("session is no longer live"));
        }

        let record = upsert_in(&mut *tx, session, token_hash, now, expires_at).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn touch_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE sessions SET last_activity = $2, expires_at = $3 \
             WHERE user_id = $1 AND active AND expires_at > $2",
        )
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_live_session_by_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, AuthError> {
        let row = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE session_token_hash = $1 AND active AND expires_at > $2 \
             LIMIT 1"
        ))
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AuthError> {
        let rows = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Expire stale records of the user, then insert or update the active one.
async fn upsert_in(
    conn: &mut PgConnection,
    session: &NewSession,
    token_hash: &str,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<SessionRecord, AuthError> {
    sqlx::query(
        "UPDATE sessions SET active = false \
         WHERE user_id = $1 AND active AND expires_at <= $2",
    )
    .bind(session.user_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let record = sqlx::query_as::<_, SessionRecord>(&format!(
        "INSERT INTO sessions \
           (id, user_id, workshop_id, session_token_hash, ip_address, user_agent, \
            last_activity, expires_at, active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, $7) \
         ON CONFLICT (user_id, workshop_id) WHERE active DO UPDATE SET \
           session_token_hash = EXCLUDED.session_token_hash, \
           ip_address = EXCLUDED.ip_address, \
           user_agent = EXCLUDED.user_agent, \
           last_activity = EXCLUDED.last_activity, \
           expires_at = EXCLUDED.expires_at \
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(Uuid::now_v7())
    .bind(session.user_id)
    .bind(session.workshop_id)
    .bind(token_hash)
    .bind(session.ip_address.as_deref())
    .bind(session.user_agent.as_deref())
    .bind(now)
    .bind(expires_at)
    .fetch_one(&mut *conn)
    .await?;
    Ok(record)
}

/// Map a unique violation on `users.email` to [`Message::EmailTaken`].
fn email_taken_or(error: sqlx::Error, email: &str) -> AuthError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::validation(
            Message::EmailTaken,
            format!("email '{email}' already registered"),
        ),
        _ => AuthError::Persistence(error),
    }
}
