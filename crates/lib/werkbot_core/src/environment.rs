//! Deployment environment.

use std::fmt;

/// Where the process runs. Anything not explicitly marked as a development
/// environment is treated as production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    /// Interpret an `APP_ENV`-style value. `None` and unknown values mean production.
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("development" | "dev" | "local" | "test") => Environment::Development,
            _ => Environment::Production,
        }
    }

    /// Read `APP_ENV` from the process environment.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var("APP_ENV").ok().as_deref())
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Development => f.write_str("development"),
        }
    }
}
