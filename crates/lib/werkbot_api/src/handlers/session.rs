//! Session request handlers.

use axum::Json;
use axum::extract::State;
use uuid::Uuid;
use werkbot_core::i18n::Message;
use werkbot_core::models::session::{NewSession, ResolvedSession, SessionRecord};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::ValidatedJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    CreateSessionRequest, DataResponse, InvalidateSessionsRequest, MessageResponse,
};

/// `GET /session`: the caller's user, current workshop and role.
pub async fn get_session_handler(
    axum::Extension(caller): axum::Extension<AuthenticatedUser>,
) -> Json<DataResponse<ResolvedSession>> {
    Json(DataResponse::new(caller.session))
}

/// `POST /session`: upsert the caller's session record.
pub async fn create_session_handler(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<AuthenticatedUser>,
    ValidatedJson(body): ValidatedJson<CreateSessionRequest>,
) -> AppResult<Json<DataResponse<SessionRecord>>> {
    ensure_self(&caller, body.user_id)?;
    let record = state
        .resolver
        .create_session(NewSession {
            user_id: body.user_id,
            workshop_id: body.workshop_id,
            session_token: body.session_token,
            ip_address: body.ip_address,
            user_agent: body.user_agent,
        })
        .await?;
    Ok(Json(DataResponse::new(record)))
}

/// `DELETE /session`: invalidate all of the caller's sessions.
pub async fn invalidate_sessions_handler(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<AuthenticatedUser>,
    ValidatedJson(body): ValidatedJson<InvalidateSessionsRequest>,
) -> AppResult<Json<MessageResponse>> {
    ensure_self(&caller, body.user_id)?;
    state.resolver.invalidate_sessions(body.user_id).await?;
    Ok(Json(MessageResponse::new(
        Message::SessionsInvalidated.text(state.config.locale),
    )))
}

/// `GET /sessions`: the caller's session records, newest first.
pub async fn list_sessions_handler(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<DataResponse<Vec<SessionRecord>>>> {
    let records = state
        .resolver
        .list_sessions(caller.session.user.id)
        .await?;
    Ok(Json(DataResponse::new(records)))
}

/// Writes are only allowed on one's own sessions, and never for the demo identity.
pub(crate) fn ensure_self(caller: &AuthenticatedUser, user_id: Uuid) -> AppResult<()> {
    if caller.mock {
        return Err(AppError::Forbidden("demo identity cannot write sessions".into()));
    }
    if caller.session.user.id != user_id {
        return Err(AppError::Forbidden(format!(
            "user {} tried to modify sessions of {user_id}",
            caller.session.user.id
        )));
    }
    Ok(())
}
