//! Authentication service: login, registration, refresh and logout flows
//! on top of `werkbot_core`'s resolver.

use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use tracing::info;
use uuid::Uuid;
use werkbot_core::auth::password::{check_password_policy, hash_password_with_cost, verify_password};
use werkbot_core::i18n::Message;
use werkbot_core::models::auth::{User, UserWithPassword};
use werkbot_core::models::session::NewSession;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::TokenResponse;

/// Where a request came from, as far as the proxy in front tells us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientContext {
    /// First `X-Forwarded-For` hop, else `X-Real-IP`; `User-Agent` as sent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| header("x-real-ip"))
            .map(str::to_string);
        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// Authenticate with email + password.
///
/// Unknown accounts and wrong passwords fail with the same error. Every attempt uses up one rate-limit slot until a success
/// resets the key.
pub async fn login(
    state: &AppState,
    email: &str,
    password: &str,
    client: ClientContext,
) -> AppResult<TokenResponse> {
    let email = email.trim();
    state.rate_limiter.try_acquire(email).await?;

    let found = state.resolver.store().find_user_by_email(email).await?;
    let (user, hash) = match found {
        Some(UserWithPassword {
            user,
            password_hash: Some(hash),
        }) => (user, hash),
        _ => return Err(AppError::InvalidCredentials),
    };
    if !verify_password(password, &hash)? {
        return Err(AppError::InvalidCredentials);
    }

    state.rate_limiter.reset(email).await;
    info!(user_id = %user.id, "login succeeded");
    start_session(state, user, client).await
}

/// Create an account and sign it in.
pub async fn register(
    state: &AppState,
    email: &str,
    password: &str,
    name: Option<&str>,
    client: ClientContext,
) -> AppResult<TokenResponse> {
    let email = email.trim();
    if !is_plausible_email(email) {
        return Err(AppError::Validation {
            message: Message::InvalidEmail,
            detail: "email must look like local@domain".into(),
        });
    }
    check_password_policy(password)?;

    let store = state.resolver.store();
    if store.find_user_by_email(email).await?.is_some() {
        return Err(AppError::Validation {
            message: Message::EmailTaken,
            detail: "email already registered".into(),
        });
    }

    let hash = hash_password_with_cost(password, state.config.bcrypt_cost)?;
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    let user = store.create_user(email, name, Some(&hash)).await?;
    info!(user_id = %user.id, "user registered");
    start_session(state, user, client).await
}

/// Exchange a refresh token for a new pair, retiring the session it belonged to.
pub async fn refresh(
    state: &AppState,
    refresh_token: &str,
    client: ClientContext,
) -> AppResult<TokenResponse> {
    let (user, record) = state
        .resolver
        .session_for_refresh_token(refresh_token)
        .await?;
    start_session_replacing(state, user, client, Some(record.id)).await
}

/// End every session of `user`.
pub async fn logout(state: &AppState, user: &User) -> AppResult<()> {
    state.resolver.invalidate_sessions(user.id).await?;
    info!(user_id = %user.id, "logged out");
    Ok(())
}

async fn start_session(
    state: &AppState,
    user: User,
    client: ClientContext,
) -> AppResult<TokenResponse> {
    start_session_replacing(state, user, client, None).await
}

/// Resolve the current role, issue tokens and record the session, retiring
/// `replacing` in the same step. The refresh token doubles as the opaque
/// session token.
async fn start_session_replacing(
    state: &AppState,
    user: User,
    client: ClientContext,
    replacing: Option<Uuid>,
) -> AppResult<TokenResponse> {
    let session = state.resolver.resolve_user(user).await?;
    let tokens = state
        .resolver
        .issue_tokens(&session.user, session.workshop.as_ref(), session.role)?;

    let new_session = NewSession {
        user_id: session.user.id,
        workshop_id: session.workshop.as_ref().map(|w| w.id),
        session_token: tokens.refresh_token.clone(),
        ip_address: client.ip_address,
        user_agent: client.user_agent,
    };
    match replacing {
        Some(retired_id) => state.resolver.rotate_session(retired_id, new_session).await?,
        None => state.resolver.create_session(new_session).await?,
    };

    Ok(TokenResponse::new(tokens, session))
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn client_context_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        headers.insert(USER_AGENT, HeaderValue::from_static("UA-string"));
        let ctx = ClientContext::from_headers(&headers);
        assert_eq!(ctx.ip_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(ctx.user_agent.as_deref(), Some("UA-string"));
    }

    #[test]
    fn client_context_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        let ctx = ClientContext::from_headers(&headers);
        assert_eq!(ctx.ip_address.as_deref(), Some("10.0.0.9"));
        assert!(ctx.user_agent.is_none());

        assert_eq!(
            ClientContext::from_headers(&HeaderMap::new()),
            ClientContext::default()
        );
    }

    #[test]
    fn email_plausibility() {
        assert!(is_plausible_email("chef@werkstatt.de"));
        assert!(!is_plausible_email("chef"));
        assert!(!is_plausible_email("@werkstatt.de"));
        assert!(!is_plausible_email("chef@werkstatt"));
        assert!(!is_plausible_email("chef @werkstatt.de"));
        assert!(!is_plausible_email("a@b@c.de"));
    }
}
