//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use werkbot_core::i18n::Message;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::ValidatedJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    DataResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest, TokenResponse,
};
use crate::services::auth::{self, ClientContext};

/// `POST /auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> AppResult<Json<DataResponse<TokenResponse>>> {
    let resp = auth::login(
        &state,
        &body.email,
        &body.password,
        ClientContext::from_headers(&headers),
    )
    .await?;
    Ok(Json(DataResponse::new(resp)))
}

/// `POST /auth/register`: create a new user account and sign it in.
pub async fn register_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> AppResult<Json<DataResponse<TokenResponse>>> {
    let resp = auth::register(
        &state,
        &body.email,
        &body.password,
        body.name.as_deref(),
        ClientContext::from_headers(&headers),
    )
    .await?;
    Ok(Json(DataResponse::new(resp)))
}

/// `POST /auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<RefreshRequest>,
) -> AppResult<Json<DataResponse<TokenResponse>>> {
    let resp = auth::refresh(
        &state,
        &body.refresh_token,
        ClientContext::from_headers(&headers),
    )
    .await?;
    Ok(Json(DataResponse::new(resp)))
}

/// `POST /auth/logout`: end every session of the caller. Requires authentication.
pub async fn logout_handler(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<MessageResponse>> {
    if caller.mock {
        return Err(AppError::Forbidden("demo identity cannot log out".into()));
    }
    auth::logout(&state, &caller.session.user).await?;
    Ok(Json(MessageResponse::new(
        Message::LoggedOut.text(state.config.locale),
    )))
}
