//! Failed-login throttle.
//!
//! Counts failed credential checks per username inside a rolling window and
//! raises a `warn` audit event once the count passes the threshold. It never
//! blocks a login itself; enforcement is left to the rate limiter in front of
//! the engine.
//!
//! Each increment reads back its own post-increment value, so two
//! concurrent failures past the threshold may both emit an event.

use std::sync::Arc;

use tracing::debug;

use super::AuthError;
use crate::audit::{ACTION_FAILED_LOGIN, AuditEvent, AuditSink};
use crate::cache::{KvCache, failed_login_key};

#[derive(Clone)]
pub struct FailedLoginThrottle {
    cache: Arc<dyn KvCache>,
    audit: Arc<dyn AuditSink>,
    threshold: i64,
    window_secs: u64,
}

impl FailedLoginThrottle {
    pub fn new(
        cache: Arc<dyn KvCache>,
        audit: Arc<dyn AuditSink>,
        threshold: i64,
        window_secs: u64,
    ) -> Self {
        Self {
            cache,
            audit,
            threshold,
            window_secs,
        }
    }

    /// Count a failure and return the new count for the window.
    pub async fn record_failure(&self, username: &str) -> Result<i64, AuthError> {
        let key = failed_login_key(username);
        let count = self.cache.increment(&key).await?;
        if let Err(e) = self.cache.expire(&key, self.window_secs).await {
            // A counter without a TTL would never lapse.
            let _ = self.cache.delete(&key).await;
            return Err(e.into());
        }
        debug!(username, count, "failed login recorded");

        if count > self.threshold {
            self.audit.record(
                AuditEvent::warn(
                    ACTION_FAILED_LOGIN,
                    format!(
                        "{count} failed login attempts for {username} within {}s",
                        self.window_secs
                    ),
                )
                .with_identity(username)
                .with_outcome("failed"),
            );
        }
        Ok(count)
    }

    /// Forget all failures for `username`.
    pub async fn record_success(&self, username: &str) -> Result<(), AuthError> {
        self.cache.delete(&failed_login_key(username)).await?;
        Ok(())
    }

    /// Current failure count; an expired or missing counter is zero.
    pub async fn attempts(&self, username: &str) -> Result<i64, AuthError> {
        let raw = self.cache.get(&failed_login_key(username)).await?;
        match raw {
            None => Ok(0),
            Some(v) => v
                .parse()
                .map_err(|_| AuthError::DependencyUnavailable(format!("corrupt counter for {username}"))),
        }
    }
}
