//! Failed-login throttling.
//!
//! Constructed once at start-up and shared through application state.

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use crate::auth::AuthError;
use crate::cache::TtlCache;

/// Default number of failed attempts tolerated per window.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default window length: 15 minutes.
pub const DEFAULT_WINDOW_SECS: i64 = 15 * 60;

/// Longest accepted window: one week.
pub const MAX_WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

/// Counts sign-in attempts per key inside a fixed window opened by the first one.
#[derive(Debug)]
pub struct LoginRateLimiter {
    failures: Mutex<TtlCache<String, u32>>,
    max_attempts: u32,
    window: Duration,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            failures: Mutex::new(TtlCache::new(window)),
            max_attempts: max_attempts.max(1),
            window,
        }
    }

    /// Reserve one attempt for `key`, counting it as failed until
    /// [`LoginRateLimiter::reset`] clears the key.
    ///
    /// Check and increment share one lock, so concurrent attempts cannot all
    /// slip under the limit. Err with [`AuthError::RateLimited`] once the key
    /// has used up its attempts.
    pub async fn try_acquire(&self, key: &str) -> Result<(), AuthError> {
        let key = normalize(key);
        let mut failures = self.failures.lock().await;
        let count = failures.get(&key).unwrap_or(0);
        if count >= self.max_attempts {
            let retry_after_secs = failures
                .expires_at(&key)
                .map(|at| (at - Utc::now()).num_seconds().max(1))
                .unwrap_or(1);
            return Err(AuthError::RateLimited { retry_after_secs });
        }

        let count = count + 1;
        if !failures.replace(&key, count) {
            failures.set_with_ttl(key.clone(), count, self.window);
        }
        if count == self.max_attempts {
            warn!(key = %key, attempts = count, "login attempts exhausted");
        }
        Ok(())
    }

    /// Forget failures for `key` after a successful sign-in.
    pub async fn reset(&self, key: &str) {
        self.failures.lock().await.invalidate(&normalize(key));
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Duration::seconds(DEFAULT_WINDOW_SECS))
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}
