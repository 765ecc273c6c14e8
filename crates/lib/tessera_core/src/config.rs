//! Engine configuration.

use std::str::FromStr;

use tracing::warn;

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 15 * 60;

/// Refresh token lifetime: 7 days. Session bindings share this window.
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Failures above this count within the window raise an audit event.
pub const DEFAULT_FAILED_LOGIN_THRESHOLD: i64 = 7;

/// Rolling window for the failed-login counter: 1 hour.
pub const DEFAULT_FAILED_LOGIN_WINDOW_SECS: u64 = 60 * 60;

/// bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Costs bcrypt accepts.
pub const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Tunables for the auth engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthConfig {
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub failed_login_threshold: i64,
    pub failed_login_window_secs: u64,
    /// Revoke and reissue the refresh token on every refresh call.
    pub rotate_refresh: bool,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            failed_login_threshold: DEFAULT_FAILED_LOGIN_THRESHOLD,
            failed_login_window_secs: DEFAULT_FAILED_LOGIN_WINDOW_SECS,
            rotate_refresh: false,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl AuthConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                           | Default  |
    /// |------------------------------------|----------|
    /// | `TESSERA_ACCESS_TTL_SECS`          | `900`    |
    /// | `TESSERA_REFRESH_TTL_SECS`         | `604800` |
    /// | `TESSERA_FAILED_LOGIN_THRESHOLD`   | `7`      |
    /// | `TESSERA_FAILED_LOGIN_WINDOW_SECS` | `3600`   |
    /// | `TESSERA_ROTATE_REFRESH`           | `false`  |
    /// | `TESSERA_BCRYPT_COST`              | `10`     |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            access_ttl_secs: parse_or(&lookup, "TESSERA_ACCESS_TTL_SECS", defaults.access_ttl_secs),
            refresh_ttl_secs: parse_or(
                &lookup,
                "TESSERA_REFRESH_TTL_SECS",
                defaults.refresh_ttl_secs,
            ),
            failed_login_threshold: parse_or(
                &lookup,
                "TESSERA_FAILED_LOGIN_THRESHOLD",
                defaults.failed_login_threshold,
            ),
            failed_login_window_secs: parse_or(
                &lookup,
                "TESSERA_FAILED_LOGIN_WINDOW_SECS",
                defaults.failed_login_window_secs,
            ),
            rotate_refresh: parse_or(&lookup, "TESSERA_ROTATE_REFRESH", defaults.rotate_refresh),
            bcrypt_cost: parse_or(&lookup, "TESSERA_BCRYPT_COST", defaults.bcrypt_cost),
        }
        .or_defaults()
    }

    /// Problems that make this config unusable (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.access_ttl_secs == 0 || self.refresh_ttl_secs == 0 {
            errors.push("Token lifetimes must be greater than zero".to_string());
        } else if self.access_ttl_secs >= self.refresh_ttl_secs {
            errors.push(format!(
                "Access lifetime ({}s) must be shorter than refresh lifetime ({}s)",
                self.access_ttl_secs, self.refresh_ttl_secs
            ));
        }
        if self.failed_login_window_secs == 0 {
            errors.push("Failed-login window must be greater than zero".to_string());
        }
        if self.failed_login_threshold < 0 {
            errors.push("Failed-login threshold must not be negative".to_string());
        }
        if !BCRYPT_COST_RANGE.contains(&self.bcrypt_cost) {
            errors.push(format!(
                "bcrypt cost must be within {}..={}",
                BCRYPT_COST_RANGE.start(),
                BCRYPT_COST_RANGE.end()
            ));
        }
        errors
    }

    /// Replace each invalid setting with its default, warning once per fix.
    fn or_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.access_ttl_secs == 0
            || self.refresh_ttl_secs == 0
            || self.access_ttl_secs >= self.refresh_ttl_secs
        {
            warn!(
                access_ttl_secs = self.access_ttl_secs,
                refresh_ttl_secs = self.refresh_ttl_secs,
                "invalid token lifetimes, using defaults"
            );
            self.access_ttl_secs = defaults.access_ttl_secs;
            self.refresh_ttl_secs = defaults.refresh_ttl_secs;
        }
        if self.failed_login_window_secs == 0 {
            warn!("failed-login window of 0s, using default");
            self.failed_login_window_secs = defaults.failed_login_window_secs;
        }
        if self.failed_login_threshold < 0 {
            warn!(
                threshold = self.failed_login_threshold,
                "negative failed-login threshold, using default"
            );
            self.failed_login_threshold = defaults.failed_login_threshold;
        }
        if !BCRYPT_COST_RANGE.contains(&self.bcrypt_cost) {
            warn!(cost = self.bcrypt_cost, "bcrypt cost out of range, using default");
            self.bcrypt_cost = defaults.bcrypt_cost;
        }
        self
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "ignoring unparsable config value");
                default
            }
        },
    }
}
