//! Integration tests: build the router over the in-memory store and drive
//! it with `oneshot` requests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;
use werkbot_api::config::ApiConfig;
use werkbot_api::{AppState, router};
use werkbot_core::auth::password::hash_password_with_cost;
use werkbot_core::i18n::{Locale, Message};
use werkbot_core::models::auth::User;
use werkbot_core::models::session::Role;
use werkbot_core::store::{MemoryStore, SessionStore};

use unreachable_store::FailingStore;

const PASSWORD: &str = "werkstatt-geheim";

struct Harness {
    app: Router,
    state: AppState,
    store: Arc<MemoryStore>,
}

fn test_config() -> ApiConfig {
    let mut config = ApiConfig::for_development("integration-test-secret");
    config.bcrypt_cost = 4;
    config
}

fn harness_with(config: ApiConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), config);
    Harness {
        app: router(state.clone()),
        state,
        store,
    }
}

fn harness() -> Harness {
    harness_with(test_config())
}

impl Harness {
    async fn user(&self, email: &str) -> User {
        let hash = hash_password_with_cost(PASSWORD, 4).unwrap();
        self.store
            .create_user(email, Some("Test"), Some(&hash))
            .await
            .unwrap()
    }

    fn token_for(&self, user: &User) -> String {
        self.state
            .resolver
            .issue_tokens(user, None, Role::Customer)
            .unwrap()
            .access_token
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        send(&self.app, request).await
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn german(message: Message) -> &'static str {
    message.text(Locale::De)
}

#[tokio::test]
async fn get_session_without_credentials_is_401() {
    let h = harness();
    let (status, _, body) = h.send(request(Method::GET, "/session", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": german(Message::Unauthenticated) }));

    for bad in ["Bearer", "Basic abc", "Bearer garbage"] {
        let req = Request::builder()
            .uri("/session")
            .header(header::AUTHORIZATION, bad)
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = h.send(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header {bad:?}");
        assert!(body.get("details").is_none());
    }
}

#[tokio::test]
async fn get_session_follows_workshop_activation() {
    let h = harness();
    let u1 = h.user("u1@werkstatt.de").await;
    let w1 = h.store.add_workshop("Werkstatt Eins", "u1@werkstatt.de", true).await;
    let token = h.token_for(&u1);

    let (status, _, body) = h
        .send(request(Method::GET, "/session", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["role"], "owner");
    assert_eq!(body["data"]["workshop"]["id"], w1.id.to_string());
    assert_eq!(body["data"]["user"]["email"], "u1@werkstatt.de");

    h.store.set_workshop_active(w1.id, false).await;
    let (status, _, body) = h
        .send(request(Method::GET, "/session", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "customer");
    assert_eq!(body["data"]["workshop"], Value::Null);
}

#[tokio::test]
async fn employee_role_comes_from_membership() {
    let h = harness();
    let user = h.user("geselle@werkstatt.de").await;
    let workshop = h.store.add_workshop("Werkstatt", "chef@werkstatt.de", true).await;
    h.store
        .add_membership(user.id, workshop.id, Role::Employee, true)
        .await;
    let token = h.token_for(&user);

    let (_, _, body) = h
        .send(request(Method::GET, "/session", Some(&token), None))
        .await;
    assert_eq!(body["data"]["role"], "employee");
    assert_eq!(body["data"]["workshop"]["name"], "Werkstatt");
}

#[tokio::test]
async fn create_session_then_list_shows_client_details() {
    let h = harness();
    let u2 = h.user("u2@werkstatt.de").await;
    let w2 = h.store.add_workshop("Werkstatt Zwei", "u2@werkstatt.de", true).await;
    let token = h.token_for(&u2);

    let before = Utc::now();
    let (status, _, body) = h
        .send(request(
            Method::POST,
            "/session",
            Some(&token),
            Some(json!({
                "user_id": u2.id,
                "workshop_id": w2.id,
                "session_token": "tok",
                "ip_address": "1.2.3.4",
                "user_agent": "UA-string",
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert!(body["data"].get("session_token_hash").is_none());

    let (status, _, body) = h
        .send(request(Method::GET, "/sessions", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["active"], true);
    assert_eq!(record["ip_address"], "1.2.3.4");
    assert_eq!(record["user_agent"], "UA-string");
    assert_eq!(record["workshop_id"], w2.id.to_string());

    let expires_at: DateTime<Utc> = record["expires_at"].as_str().unwrap().parse().unwrap();
    let drift = (expires_at - (before + Duration::hours(24))).num_seconds().abs();
    assert!(drift <= 5, "expiry drifted by {drift}s");
}

#[tokio::test]
async fn session_writes_for_someone_else_are_forbidden() {
    let h = harness();
    let me = h.user("ich@example.de").await;
    let other = h.user("du@example.de").await;
    let token = h.token_for(&me);

    let (status, _, body) = h
        .send(request(
            Method::DELETE,
            "/session",
            Some(&token),
            Some(json!({ "user_id": other.id })),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], german(Message::Forbidden));
}

#[tokio::test]
async fn malformed_bodies_are_400() {
    let h = harness();
    let user = h.user("form@example.de").await;
    let token = h.token_for(&user);

    let cases = [
        json!({ "user_id": user.id, "session_token": "t", "surprise": true }),
        json!({ "user_id": "not-a-uuid", "session_token": "t" }),
        json!({ "session_token": "t" }),
    ];
    for body in cases {
        let (status, _, response) = h
            .send(request(Method::POST, "/session", Some(&token), Some(body.clone())))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(response["error"], german(Message::InvalidRequest));
        assert!(response["details"].is_string());
    }
}

#[tokio::test]
async fn delete_session_is_idempotent() {
    let h = harness();
    let user = h.user("weg@example.de").await;
    let token = h.token_for(&user);
    h.send(request(
        Method::POST,
        "/session",
        Some(&token),
        Some(json!({ "user_id": user.id, "session_token": "a" })),
    ))
    .await;

    for _ in 0..2 {
        let (status, _, body) = h
            .send(request(
                Method::DELETE,
                "/session",
                Some(&token),
                Some(json!({ "user_id": user.id })),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], german(Message::SessionsInvalidated));
    }

    let records = h.store.list_sessions(user.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].active);
}

#[tokio::test]
async fn register_refresh_logout_flow() {
    let h = harness();
    h.store.add_workshop("Meisterbetrieb", "meister@werkstatt.de", true).await;

    let req = Request::builder()
        .method(Method::POST)
        .uri("/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.7")
        .header(header::USER_AGENT, "Werkbot-Test/1.0")
        .body(Body::from(
            json!({ "email": "Meister@Werkstatt.de", "password": PASSWORD, "name": "Meister" })
                .to_string(),
        ))
        .unwrap();
    let (status, _, body) = h.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["token_type"], "Bearer");
    assert_eq!(data["expires_in"], 86400);
    assert_eq!(data["role"], "owner");
    let access = data["access_token"].as_str().unwrap().to_string();
    let refresh = data["refresh_token"].as_str().unwrap().to_string();

    let (_, _, sessions) = h
        .send(request(Method::GET, "/sessions", Some(&access), None))
        .await;
    assert_eq!(sessions["data"][0]["ip_address"], "203.0.113.7");
    assert_eq!(sessions["data"][0]["user_agent"], "Werkbot-Test/1.0");

    // Access tokens are not refresh tokens.
    let (status, _, _) = h
        .send(request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": access })),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = h
        .send(request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let rotated = body["data"]["refresh_token"].as_str().unwrap().to_string();
    let access = body["data"]["access_token"].as_str().unwrap().to_string();

    // The old refresh token was retired by rotation.
    let (status, _, _) = h
        .send(request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = h
        .send(request(Method::POST, "/auth/logout", Some(&access), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], german(Message::LoggedOut));

    let (status, _, _) = h
        .send(request(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": rotated })),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_validates_input() {
    let h = harness();
    h.user("vergeben@example.de").await;

    let cases = [
        (json!({ "email": "kurz@example.de", "password": "kurz" }), Message::PasswordTooShort),
        (json!({ "email": "kein-at", "password": PASSWORD }), Message::InvalidEmail),
        (json!({ "email": "VERGEBEN@example.de", "password": PASSWORD }), Message::EmailTaken),
    ];
    for (body, message) in cases {
        let (status, _, response) = h
            .send(request(Method::POST, "/auth/register", None, Some(body)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], german(message));
    }
}

#[tokio::test]
async fn login_failures_are_generic_and_rate_limited() {
    let mut config = test_config();
    config.login_max_attempts = 2;
    let h = harness_with(config);
    h.user("kunde@example.de").await;

    let attempt = |email: &str, password: &str| {
        request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
    };

    let (status, _, unknown) = h.send(attempt("niemand@example.de", PASSWORD)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, wrong) = h.send(attempt("kunde@example.de", "falsch-falsch")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, wrong);
    assert_eq!(wrong["error"], german(Message::InvalidCredentials));

    let (status, _, _) = h.send(attempt("kunde@example.de", "falsch-falsch")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Even the right password is refused while the key is blocked.
    let (status, headers, body) = h.send(attempt("KUNDE@example.de", PASSWORD)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], german(Message::RateLimited));
    let retry: i64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!(retry > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_wrong_passwords_stay_within_the_limit() {
    let mut config = test_config();
    config.login_max_attempts = 2;
    let h = harness_with(config);
    h.user("kunde@example.de").await;

    let attempts: Vec<_> = (0..20)
        .map(|_| {
            let app = h.app.clone();
            tokio::spawn(async move {
                let req = request(
                    Method::POST,
                    "/auth/login",
                    None,
                    Some(json!({ "email": "kunde@example.de", "password": "falsch-falsch" })),
                );
                send(&app, req).await.0
            })
        })
        .collect();

    let mut checked = 0;
    let mut blocked = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            StatusCode::UNAUTHORIZED => checked += 1,
            StatusCode::TOO_MANY_REQUESTS => blocked += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(checked, 2);
    assert_eq!(blocked, 18);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn refresh_token_rotates_only_once_under_replay() {
    let h = harness();
    let user = h.user("kunde@example.de").await;
    let (status, _, body) = h
        .send(request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "kunde@example.de", "password": PASSWORD })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    let replays: Vec<_> = (0..10)
        .map(|_| {
            let app = h.app.clone();
            let refresh = refresh.clone();
            tokio::spawn(async move {
                let req = request(
                    Method::POST,
                    "/auth/refresh",
                    None,
                    Some(json!({ "refresh_token": refresh })),
                );
                send(&app, req).await.0
            })
        })
        .collect();

    let mut rotated = 0;
    for replay in replays {
        match replay.await.unwrap() {
            StatusCode::OK => rotated += 1,
            StatusCode::UNAUTHORIZED => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(rotated, 1);

    let sessions = h.state.resolver.list_sessions(user.id).await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions.iter().filter(|s| s.active).count(), 1);
}

#[tokio::test]
async fn successful_login_issues_tokens() {
    let h = harness();
    let user = h.user("kunde@example.de").await;
    let (status, _, body) = h
        .send(request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": " Kunde@Example.de ", "password": PASSWORD })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["role"], "customer");
    assert_eq!(body["data"]["user"]["id"], user.id.to_string());
    let claims = h
        .state
        .resolver
        .signer()
        .verify_access_token(body["data"]["access_token"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.sub, user.id.to_string());
    assert!(!claims.mock);
}

#[tokio::test]
async fn demo_identity_only_with_flag() {
    let h = harness();
    let (status, _, _) = h.send(request(Method::GET, "/session", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut config = test_config();
    config.demo_mode = true;
    let h = harness_with(config);
    let (status, _, body) = h.send(request(Method::GET, "/session", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "customer");
    assert_eq!(
        body["data"]["user"]["id"],
        werkbot_core::session::DEMO_USER_ID.to_string()
    );

    let (status, _, _) = h
        .send(request(
            Method::DELETE,
            "/session",
            None,
            Some(json!({ "user_id": werkbot_core::session::DEMO_USER_ID })),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A credential that is sent is still verified.
    let (status, _, _) = h
        .send(request(Method::GET, "/session", Some("garbage"), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn errors_follow_configured_locale() {
    let mut config = test_config();
    config.locale = Locale::En;
    let h = harness_with(config);
    let (status, _, body) = h.send(request(Method::GET, "/session", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], Message::Unauthenticated.text(Locale::En));
}

#[tokio::test]
async fn store_failures_are_500_without_detail() {
    let config = test_config();
    let state = AppState::new(Arc::new(FailingStore), config);
    let app = router(state.clone());
    let user = User {
        id: uuid::Uuid::new_v4(),
        email: "x@example.de".into(),
        name: None,
    };
    let token = state
        .resolver
        .issue_tokens(&user, None, Role::Customer)
        .unwrap()
        .access_token;

    let (status, _, body) = send(&app, request(Method::GET, "/session", Some(&token), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": german(Message::PersistenceFailure) }));

    let (status, _, body) = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store_reachable"], false);
}

#[tokio::test]
async fn health_reports_reachable_store() {
    let h = harness();
    let (status, _, body) = h.send(request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store_reachable"], true);
}

mod unreachable_store {
    //! A store that is never reachable.

    use chrono::{DateTime, Utc};
    use uuid::Uuid;
    use werkbot_core::auth::AuthError;
    use werkbot_core::models::auth::{User, UserWithPassword};
    use werkbot_core::models::session::{Membership, NewSession, SessionRecord, Workshop};
    use werkbot_core::store::SessionStore;

    pub struct FailingStore;

    fn down<T>() -> Result<T, AuthError> {
        Err(AuthError::Persistence(sqlx::Error::PoolTimedOut))
    }

    #[async_trait::async_trait]
    impl SessionStore for FailingStore {
        async fn find_user(&self, _: Uuid) -> Result<Option<User>, AuthError> {
            down()
        }
        async fn find_user_by_email(&self, _: &str) -> Result<Option<UserWithPassword>, AuthError> {
            down()
        }
        async fn create_user(
            &self,
            _: &str,
            _: Option<&str>,
            _: Option<&str>,
        ) -> Result<User, AuthError> {
            down()
        }
        async fn find_workshops_by_owner(&self, _: &str) -> Result<Vec<Workshop>, AuthError> {
            down()
        }
        async fn find_memberships(&self, _: Uuid) -> Result<Vec<Membership>, AuthError> {
            down()
        }
        async fn upsert_session(
            &self,
            _: &NewSession,
            _: &str,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<SessionRecord, AuthError> {
            down()
        }
        async fn invalidate_sessions(&self, _: Uuid) -> Result<u64, AuthError> {
            down()
        }
        async fn rotate_session(
            &self,
            _: Uuid,
            _: &NewSession,
            _: &str,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<SessionRecord, AuthError> {
            down()
        }
        async fn touch_sessions(
            &self,
            _: Uuid,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<u64, AuthError> {
            down()
        }
        async fn find_live_session_by_token(
            &self,
            _: &str,
            _: DateTime<Utc>,
        ) -> Result<Option<SessionRecord>, AuthError> {
            down()
        }
        async fn list_sessions(&self, _: Uuid) -> Result<Vec<SessionRecord>, AuthError> {
            down()
        }
        async fn ping(&self) -> Result<(), AuthError> {
            down()
        }
    }
}
