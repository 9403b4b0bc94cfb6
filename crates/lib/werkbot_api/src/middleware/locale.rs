//! Re-renders error bodies in the configured locale.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use tracing::error;

use crate::AppState;
use crate::error::ErrorRender;

/// Outermost layer. Responses without an [`ErrorRender`] pass through untouched.
pub async fn localize_errors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let locale = state.config.locale;
    let Some(render) = response.extensions().get::<ErrorRender>().cloned() else {
        return response;
    };
    if locale == Default::default() {
        return response;
    }

    match serde_json::to_vec(&render.body(locale)) {
        Ok(bytes) => {
            response.headers_mut().remove(CONTENT_LENGTH);
            *response.body_mut() = Body::from(bytes);
        }
        Err(e) => error!(error = %e, "failed to localize error body"),
    }
    response
}
