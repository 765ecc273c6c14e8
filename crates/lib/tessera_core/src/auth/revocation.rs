//! Revocation ledger.
//!
//! Tokens revoked before their natural expiry are recorded under
//! `blocklist:<fingerprint>` with a TTL equal to the token's remaining
//! lifetime. The ledger therefore cleans itself: an entry never outlives
//! the token it blocks, and once the token has expired the signature check
//! rejects it on its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::AuthError;
use super::jwt::{TokenIssuer, fingerprint};
use crate::cache::{KvCache, blocklist_key};

const REVOKED_SENTINEL: &str = "1";

/// What `revoke` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    /// Blocked for the given number of seconds.
    Recorded { ttl_secs: u64 },
    /// The token was already dead; nothing written.
    AlreadyExpired,
}

#[derive(Clone)]
pub struct RevocationLedger {
    cache: Arc<dyn KvCache>,
    issuer: TokenIssuer,
}

impl RevocationLedger {
    pub fn new(cache: Arc<dyn KvCache>, issuer: TokenIssuer) -> Self {
        Self { cache, issuer }
    }

    /// Block `token` for the rest of its life.
    ///
    /// Fails with `InvalidToken` when the signature or shape is bad; an
    /// expired token is a successful no-op.
    pub async fn revoke(&self, token: &str) -> Result<Revocation, AuthError> {
        let claims = self.issuer.decode_allow_expired(token)?;
        self.revoke_fingerprint(&fingerprint(token), claims.exp).await
    }

    /// Block a token known only by fingerprint and expiry.
    pub async fn revoke_fingerprint(&self, fingerprint: &str, expires_at: i64) -> Result<Revocation, AuthError> {
        self.revoke_fingerprint_at(fingerprint, expires_at, Utc::now()).await
    }

    async fn revoke_fingerprint_at(
        &self,
        fingerprint: &str,
        expires_at: i64,
        now: DateTime<Utc>,
    ) -> Result<Revocation, AuthError> {
        let remaining = expires_at - now.timestamp();
        if remaining <= 0 {
            debug!(token = short(fingerprint), "revoke skipped, token already expired");
            return Ok(Revocation::AlreadyExpired);
        }
        let ttl_secs = remaining as u64;
        self.cache
            .set_with_ttl(&blocklist_key(fingerprint), ttl_secs, REVOKED_SENTINEL)
            .await?;
        debug!(token = short(fingerprint), ttl_secs, "token revoked");
        Ok(Revocation::Recorded { ttl_secs })
    }

    /// Revoke a fingerprint only if nobody has yet, in one cache round-trip.
    ///
    /// Returns `true` for the single caller that recorded the revocation.
    /// An expired token cannot be claimed.
    pub async fn claim_fingerprint(&self, fingerprint: &str, expires_at: i64) -> Result<bool, AuthError> {
        let remaining = expires_at - Utc::now().timestamp();
        if remaining <= 0 {
            return Ok(false);
        }
        let claimed = self
            .cache
            .set_if_absent(&blocklist_key(fingerprint), remaining as u64, REVOKED_SENTINEL)
            .await?;
        debug!(token = short(fingerprint), claimed, "revocation claim");
        Ok(claimed)
    }

    /// Whether `token` is on the blocklist. Presence alone decides.
    pub async fn is_revoked(&self, token: &str) -> Result<bool, AuthError> {
        self.is_fingerprint_revoked(&fingerprint(token)).await
    }

    pub async fn is_fingerprint_revoked(&self, fingerprint: &str) -> Result<bool, AuthError> {
        Ok(self.cache.get(&blocklist_key(fingerprint)).await?.is_some())
    }
}

/// Log-safe prefix of a fingerprint.
pub(crate) fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
