//! API server configuration.

use chrono::Duration;
use werkbot_core::auth::AuthError;
use werkbot_core::auth::jwt::resolve_jwt_secret;
use werkbot_core::auth::password::BCRYPT_COST;
use werkbot_core::environment::Environment;
use werkbot_core::i18n::Locale;
use werkbot_core::rate_limit::{DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_SECS, MAX_WINDOW_SECS};

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub environment: Environment,
    /// Locale for every user-facing message.
    pub locale: Locale,
    /// Serve a fixed demo customer to requests without credentials.
    pub demo_mode: bool,
    pub login_max_attempts: u32,
    pub login_window_secs: i64,
    /// bcrypt cost for newly registered passwords.
    pub bcrypt_cost: u32,
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                     | Default                              |
    /// |------------------------------|--------------------------------------|
    /// | `BIND_ADDR`                  | `127.0.0.1:3100`                     |
    /// | `DATABASE_URL`               | `postgres://localhost:5432/werkbot`  |
    /// | `JWT_SECRET` / `AUTH_SECRET` | required in production               |
    /// | `APP_ENV`                    | production                           |
    /// | `WERKBOT_LOCALE`             | `de`                                 |
    /// | `WERKBOT_DEMO_MODE`          | off                                  |
    /// | `LOGIN_MAX_ATTEMPTS`         | `5`                                  |
    /// | `LOGIN_WINDOW_SECS`          | `900`                                |
    pub fn from_env() -> Result<Self, AuthError> {
        let environment = Environment::from_env();
        let locale = match std::env::var("WERKBOT_LOCALE") {
            Ok(value) => value.parse().map_err(AuthError::Configuration)?,
            Err(_) => Locale::default(),
        };
        let config = Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/werkbot".into()),
            jwt_secret: resolve_jwt_secret(environment)?,
            environment,
            locale,
            demo_mode: std::env::var("WERKBOT_DEMO_MODE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            login_max_attempts: parse_var("LOGIN_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            login_window_secs: parse_var("LOGIN_WINDOW_SECS", DEFAULT_WINDOW_SECS)?,
            bcrypt_cost: BCRYPT_COST,
        };
        config.validate()?;
        Ok(config)
    }

    /// Development defaults with the given secret. Used by tests and the
    /// in-memory server mode.
    pub fn for_development(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: String::new(),
            jwt_secret: jwt_secret.into(),
            environment: Environment::Development,
            locale: Locale::default(),
            demo_mode: false,
            login_max_attempts: DEFAULT_MAX_ATTEMPTS,
            login_window_secs: DEFAULT_WINDOW_SECS,
            bcrypt_cost: BCRYPT_COST,
        }
    }

    /// Reject combinations that must never reach production.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.demo_mode && self.environment.is_production() {
            return Err(AuthError::Configuration(
                "WERKBOT_DEMO_MODE cannot be enabled in production".into(),
            ));
        }
        if !(1..=MAX_WINDOW_SECS).contains(&self.login_window_secs) {
            return Err(AuthError::Configuration(format!(
                "LOGIN_WINDOW_SECS must be between 1 and {MAX_WINDOW_SECS}"
            )));
        }
        Ok(())
    }

    /// Login rate-limit window, clamped to the accepted range.
    pub fn login_window(&self) -> Duration {
        Duration::seconds(self.login_window_secs.clamp(1, MAX_WINDOW_SECS))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AuthError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AuthError::Configuration(format!("{name} is not a valid number: {raw}"))),
        Err(_) => Ok(default),
    }
}
