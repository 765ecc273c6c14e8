//! Session bindings: the origin each identity's live session was opened from.
//!
//! One binding per identity, last successful authentication wins. Bindings
//! also remember which refresh token they belong to (by fingerprint), so a
//! session can be torn down from the identity id alone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::cache::{KvCache, binding_key};
use crate::models::auth::Origin;

/// Stored binding record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionBinding {
    pub address: String,
    pub user_agent: String,
    /// Fingerprint of the refresh token this session was issued with.
    pub refresh_fingerprint: String,
    /// Expiry (unix timestamp) of that refresh token.
    pub refresh_expires_at: i64,
}

impl SessionBinding {
    pub fn new(origin: &Origin, refresh_fingerprint: String, refresh_expires_at: i64) -> Self {
        Self {
            address: origin.address.clone(),
            user_agent: origin.user_agent.clone(),
            refresh_fingerprint,
            refresh_expires_at,
        }
    }

    pub fn origin(&self) -> Origin {
        Origin::new(self.address.clone(), self.user_agent.clone())
    }
}

#[derive(Clone)]
pub struct SessionBindingStore {
    cache: Arc<dyn KvCache>,
}

impl SessionBindingStore {
    pub fn new(cache: Arc<dyn KvCache>) -> Self {
        Self { cache }
    }

    /// Unconditionally overwrite the binding for `identity_id`.
    pub async fn bind(&self, identity_id: &str, binding: &SessionBinding, ttl_secs: u64) -> Result<(), AuthError> {
        let json = serde_json::to_string(binding)
            .map_err(|e| AuthError::Internal(format!("encode binding: {e}")))?;
        self.cache.set_with_ttl(&binding_key(identity_id), ttl_secs, &json).await?;
        Ok(())
    }

    /// Current binding. A record that cannot be decoded is a dependency
    /// failure, not an absent binding.
    pub async fn get(&self, identity_id: &str) -> Result<Option<SessionBinding>, AuthError> {
        let Some(raw) = self.cache.get(&binding_key(identity_id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AuthError::DependencyUnavailable(format!("corrupt binding for {identity_id}: {e}")))
    }

    pub async fn clear(&self, identity_id: &str) -> Result<(), AuthError> {
        self.cache.delete(&binding_key(identity_id)).await?;
        Ok(())
    }
}
