//! Credential gateway: the engine's only door into the credential store.
//!
//! Verifies username/password pairs and enrolls new identities. Every failed
//! verification is routed through the [`FailedLoginThrottle`]; every success
//! clears it.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use super::password::{hash_password, verify_password};
use super::throttle::FailedLoginThrottle;
use crate::models::auth::{Identity, NewIdentity, StoredIdentity};

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Credential store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Duplicate(String),

    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// External credential store contract.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<StoredIdentity>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredIdentity>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredIdentity>, StoreError>;

    /// Persist a new identity. Must fail with [`StoreError::Duplicate`] when
    /// the username or email is already taken.
    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError>;

    async fn remove(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;
}

#[derive(Clone)]
pub struct CredentialGateway {
    store: Arc<dyn CredentialStore>,
    throttle: FailedLoginThrottle,
    bcrypt_cost: u32,
    /// Hash compared against when the username is unknown, so that both
    /// failure paths pay for one bcrypt verification.
    decoy_hash: Arc<OnceLock<Option<String>>>,
}

impl CredentialGateway {
    pub fn new(store: Arc<dyn CredentialStore>, throttle: FailedLoginThrottle, bcrypt_cost: u32) -> Self {
        Self {
            store,
            throttle,
            bcrypt_cost,
            decoy_hash: Arc::new(OnceLock::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn throttle(&self) -> &FailedLoginThrottle {
        &self.throttle
    }

    /// Check a username/password pair. Unknown user and wrong password are
    /// indistinguishable to the caller.
    pub async fn verify(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let stored = self.store.find_by_username(username).await?;

        let matched = match &stored {
            Some(s) => verify_password(password, &s.password_hash)?,
            None => {
                self.burn_decoy(password);
                false
            }
        };

        match stored {
            Some(s) if matched => {
                self.throttle.record_success(username).await?;
                Ok(s.identity)
            }
            _ => {
                debug!(username, "credential check failed");
                self.throttle.record_failure(username).await?;
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Validate, check uniqueness, hash and create a new identity.
    ///
    /// Both uniqueness checks run before anything is written.
    pub async fn enroll(&self, username: &str, email: &str, password: &str) -> Result<Identity, AuthError> {
        validate_registration(username, email, password)?;

        if self.store.find_by_username(username).await?.is_some() {
            return Err(AuthError::Conflict("Username is already registered".into()));
        }
        if self.store.find_by_email(email).await?.is_some() {
            return Err(AuthError::Conflict("Email is already in use".into()));
        }

        let password_hash = hash_password(password, self.bcrypt_cost)?;
        let identity = self
            .store
            .create(NewIdentity {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;
        Ok(identity)
    }

    fn burn_decoy(&self, password: &str) {
        let decoy = self
            .decoy_hash
            .get_or_init(|| hash_password("decoy-password", self.bcrypt_cost).ok());
        if let Some(hash) = decoy {
            let _ = verify_password(password, hash);
        }
    }
}

/// Registration input checks: no empty fields, a plausible email, and a
/// password of at least [`MIN_PASSWORD_LEN`] characters.
pub fn validate_registration(username: &str, email: &str, password: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::Validation("Username must not be empty".into()));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {}
        _ => return Err(AuthError::Validation("Email address is invalid".into())),
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::auth::store::MemoryCredentialStore;
    use crate::cache::MemoryCache;

    fn gateway() -> CredentialGateway {
        let throttle = FailedLoginThrottle::new(
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryAuditSink::new()),
            7,
            3600,
        );
        CredentialGateway::new(Arc::new(MemoryCredentialStore::new()), throttle, 4)
    }

    #[tokio::test]
    async fn enroll_then_verify() {
        let gw = gateway();
        let created = gw.enroll("alice", "alice@x.com", "password1").await.unwrap();
        let verified = gw.verify("alice", "password1").await.unwrap();
        assert_eq!(created, verified);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let gw = gateway();
        gw.enroll("alice", "alice@x.com", "password1").await.unwrap();
        let wrong = gw.verify("alice", "nope-nope").await.unwrap_err();
        let unknown = gw.verify("mallory", "password1").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn failures_feed_the_throttle_and_success_clears_it() {
        let gw = gateway();
        gw.enroll("alice", "alice@x.com", "password1").await.unwrap();
        let _ = gw.verify("alice", "bad-password").await;
        let _ = gw.verify("alice", "bad-password").await;
        assert_eq!(gw.throttle().attempts("alice").await.unwrap(), 2);
        gw.verify("alice", "password1").await.unwrap();
        assert_eq!(gw.throttle().attempts("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let gw = gateway();
        gw.enroll("alice", "alice@x.com", "password1").await.unwrap();
        let err = gw.enroll("alice", "other@x.com", "password1").await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(m) if m.contains("Username")));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let gw = gateway();
        gw.enroll("alice", "alice@x.com", "password1").await.unwrap();
        let err = gw.enroll("alice2", "alice@x.com", "password1").await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(m) if m.contains("Email")));
    }

    #[test]
    fn registration_validation() {
        assert!(validate_registration("alice", "alice@x.com", "password1").is_ok());
        assert!(matches!(
            validate_registration(" ", "alice@x.com", "password1"),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            validate_registration("alice", "alice.x.com", "password1"),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            validate_registration("alice", "a@b@c", "password1"),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            validate_registration("alice", "alice@x.com", "short"),
            Err(AuthError::Validation(_))
        ));
    }
}
