//! Authentication middleware: Bearer token extraction and session resolution.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use werkbot_core::models::session::ResolvedSession;
use werkbot_core::session::{demo_session, parse_bearer};

use crate::AppState;
use crate::error::AppError;

/// The resolved caller, stored in request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub session: ResolvedSession,
    /// Demo identity injected because demo mode is on and no credential was sent.
    pub mock: bool,
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, resolves the
/// caller's workshop and role from the store, extends their live sessions,
/// and injects [`AuthenticatedUser`] into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request.headers().get(AUTHORIZATION);

    let caller = match header {
        None if state.config.demo_mode => {
            debug!(path = %request.uri().path(), "serving demo identity");
            AuthenticatedUser {
                session: demo_session(),
                mock: true,
            }
        }
        None => {
            return Err(AppError::Unauthenticated(
                "missing authorization header".into(),
            ));
        }
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| AppError::Unauthenticated("non-ascii authorization header".into()))?;
            let token = parse_bearer(value)?;
            let session = state.resolver.resolve(token).await?;
            // Keeping sessions warm is best effort.
            if let Err(e) = state.resolver.touch_sessions(session.user.id).await {
                warn!(user_id = %session.user.id, error = %e, "failed to extend sessions");
            }
            AuthenticatedUser {
                session,
                mock: false,
            }
        }
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
