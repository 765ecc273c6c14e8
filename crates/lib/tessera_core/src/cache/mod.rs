//! TTL-indexed key-value cache shared by every process running the engine.
//!
//! The engine keeps no durable state of its own: revocations, session
//! bindings and failed-login counters all live behind [`KvCache`]. The cache
//! supplies the only atomicity the engine relies on (single-key increment,
//! set-with-TTL, set-if-absent, get and delete). Timeouts and retries belong to the client
//! implementation; whatever it gives up on must surface as a [`CacheError`].

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryCache;

/// Prefix for revoked-token entries.
pub const BLOCKLIST_PREFIX: &str = "blocklist";
/// Prefix for session-binding entries.
pub const BINDING_PREFIX: &str = "token_details";
/// Prefix for failed-login counters.
pub const FAILED_LOGIN_PREFIX: &str = "failedLoginAttempts";

/// Cache errors. All of them mean "the answer is unknown", never "absent".
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation timed out: {0}")]
    Timeout(String),

    #[error("value at {0} is not an integer")]
    WrongType(String),
}

/// Minimal TTL cache contract (Redis-shaped).
#[async_trait]
pub trait KvCache: Send + Sync {
    /// Fetch a live value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl_secs`. A zero TTL stores nothing
    /// and removes any previous value.
    async fn set_with_ttl(&self, key: &str, ttl_secs: u64, value: &str)
    -> Result<(), CacheError>;

    /// Store a value only if the key is absent or expired (Redis `SET NX EX`).
    /// Returns `true` when this call stored it. A zero TTL stores nothing and
    /// returns `false`.
    async fn set_if_absent(&self, key: &str, ttl_secs: u64, value: &str)
    -> Result<bool, CacheError>;

    /// Atomically increment an integer value, creating it at 1 when absent.
    /// A newly created counter has no TTL until [`KvCache::expire`] is called.
    async fn increment(&self, key: &str) -> Result<i64, CacheError>;

    /// (Re)set the TTL of an existing key. Returns `false` when the key is absent.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, CacheError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// `blocklist:<token fingerprint>`
pub fn blocklist_key(fingerprint: &str) -> String {
    format!("{BLOCKLIST_PREFIX}:{fingerprint}")
}

/// `token_details:<identity id>`
pub fn binding_key(identity_id: &str) -> String {
    format!("{BINDING_PREFIX}:{identity_id}")
}

/// `failedLoginAttempts:<username>`
pub fn failed_login_key(username: &str) -> String {
    format!("{FAILED_LOGIN_PREFIX}:{username}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_use_expected_prefixes() {
        assert_eq!(blocklist_key("abc"), "blocklist:abc");
        assert_eq!(binding_key("42"), "token_details:42");
        assert_eq!(failed_login_key("bob"), "failedLoginAttempts:bob");
    }
}
