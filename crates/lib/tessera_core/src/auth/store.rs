//! In-memory [`CredentialStore`].
//!
//! Enforces username and email uniqueness atomically under a single lock;
//! durable stores plug in through the same trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::gateway::{CredentialStore, StoreError};
use crate::models::auth::{Identity, NewIdentity, StoredIdentity};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    identities: RwLock<HashMap<Uuid, StoredIdentity>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.identities.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find<F>(&self, pred: F) -> Result<Option<StoredIdentity>, StoreError>
    where
        F: Fn(&StoredIdentity) -> bool,
    {
        let identities = self
            .identities
            .read()
            .map_err(|_| StoreError::Unavailable("identity map poisoned".into()))?;
        Ok(identities.values().find(|s| pred(s)).cloned())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<StoredIdentity>, StoreError> {
        self.find(|s| s.identity.username == username)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredIdentity>, StoreError> {
        self.find(|s| s.identity.email == email)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredIdentity>, StoreError> {
        let identities = self
            .identities
            .read()
            .map_err(|_| StoreError::Unavailable("identity map poisoned".into()))?;
        Ok(identities.get(&id).cloned())
    }

    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let mut identities = self
            .identities
            .write()
            .map_err(|_| StoreError::Unavailable("identity map poisoned".into()))?;
        for existing in identities.values() {
            if existing.identity.username == new.username {
                return Err(StoreError::Duplicate("Username is already registered".into()));
            }
            if existing.identity.email == new.email {
                return Err(StoreError::Duplicate("Email is already in use".into()));
            }
        }
        let identity = Identity {
            id: Uuid::now_v7(),
            username: new.username,
            email: new.email,
            created_at: Utc::now(),
        };
        identities.insert(
            identity.id,
            StoredIdentity {
                identity: identity.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(identity)
    }

    async fn remove(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let mut identities = self
            .identities
            .write()
            .map_err(|_| StoreError::Unavailable("identity map poisoned".into()))?;
        Ok(identities.remove(&id).map(|s| s.identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_identity(username: &str, email: &str) -> NewIdentity {
        NewIdentity {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn create_and_find() {
        let store = MemoryCredentialStore::new();
        let created = store.create(new_identity("alice", "a@x.com")).await.unwrap();
        let by_name = store.find_by_username("alice").await.unwrap().unwrap();
        let by_mail = store.find_by_email("a@x.com").await.unwrap().unwrap();
        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_name.identity, created);
        assert_eq!(by_mail.identity, created);
        assert_eq!(by_id.password_hash, "hash");
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let store = MemoryCredentialStore::new();
        store.create(new_identity("alice", "a@x.com")).await.unwrap();
        assert!(matches!(
            store.create(new_identity("alice", "b@x.com")).await,
            Err(StoreError::Duplicate(_))
        ));
        assert!(matches!(
            store.create(new_identity("bob", "a@x.com")).await,
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn remove_returns_identity_once() {
        let store = MemoryCredentialStore::new();
        let created = store.create(new_identity("alice", "a@x.com")).await.unwrap();
        assert_eq!(store.remove(created.id).await.unwrap(), Some(created.clone()));
        assert_eq!(store.remove(created.id).await.unwrap(), None);
        assert!(store.is_empty());
    }
}
