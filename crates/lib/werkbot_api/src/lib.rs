//! # werkbot_api
//!
//! HTTP API library for Werkbot: session resolution, session records and
//! the login/refresh flows.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use werkbot_core::auth::jwt::TokenSigner;
use werkbot_core::rate_limit::LoginRateLimiter;
use werkbot_core::session::SessionResolver;
use werkbot_core::store::SessionStore;

use crate::config::ApiConfig;
use crate::handlers::{auth, health, session};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session resolver over the injected store.
    pub resolver: SessionResolver,
    /// API configuration.
    pub config: ApiConfig,
    /// Failed-login throttle, one per process.
    pub rate_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    /// Wire the resolver and rate limiter for `store`.
    pub fn new(store: Arc<dyn SessionStore>, config: ApiConfig) -> Self {
        let signer = TokenSigner::new(config.jwt_secret.as_bytes());
        let rate_limiter =
            LoginRateLimiter::new(config.login_max_attempts, config.login_window());
        Self {
            resolver: SessionResolver::new(store, signer),
            config,
            rate_limiter: Arc::new(rate_limiter),
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `werkbot_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    werkbot_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(
            routes::SESSION,
            get(session::get_session_handler)
                .post(session::create_session_handler)
                .delete(session::invalidate_sessions_handler),
        )
        .route(routes::GET_SESSIONS, get(session::list_sessions_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::locale::localize_errors,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
