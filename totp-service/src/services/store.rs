use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::ServiceError;
use crate::models::{MfaSecret, ShareGrant};

/// Persistence seam for secrets and their share grants.
///
/// Lookups that take an `owner_id` return `None` for records owned by
/// someone else, so callers cannot tell "not yours" from "not there".
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    async fn insert_secret(&self, secret: &MfaSecret) -> Result<(), ServiceError>;
    async fn find_secret(
        &self,
        owner_id: &str,
        id: Uuid,
    ) -> Result<Option<MfaSecret>, ServiceError>;
    /// Unscoped lookup, used only after a share grant has been resolved.
    async fn find_secret_by_id(&self, id: Uuid) -> Result<Option<MfaSecret>, ServiceError>;
    async fn list_secrets(&self, owner_id: &str) -> Result<Vec<MfaSecret>, ServiceError>;
    /// Replace name, ciphertext, notes and `updated_at`. Returns false when
    /// the row no longer exists.
    async fn update_secret(&self, secret: &MfaSecret) -> Result<bool, ServiceError>;
    /// Like `update_secret`, and in the same write drops every grant of
    /// the secret. Returns the number of grants removed, or `None` when the
    /// row no longer exists (in which case nothing changes).
    async fn rotate_secret(&self, secret: &MfaSecret) -> Result<Option<u64>, ServiceError>;
    /// Delete a secret together with all of its grants.
    async fn delete_secret(&self, owner_id: &str, id: Uuid) -> Result<bool, ServiceError>;

    async fn insert_grant(&self, grant: &ShareGrant) -> Result<(), ServiceError>;
    async fn find_grant_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<ShareGrant>, ServiceError>;
    async fn list_grants(&self, secret_id: Uuid) -> Result<Vec<ShareGrant>, ServiceError>;
    async fn delete_grant(&self, secret_id: Uuid, grant_id: Uuid) -> Result<bool, ServiceError>;
    /// Returns the number of grants removed.
    async fn delete_grants_for_secret(&self, secret_id: Uuid) -> Result<u64, ServiceError>;
}

/// Process-local store for tests and single-node development.
#[derive(Default)]
pub struct InMemoryStore {
    secrets: RwLock<HashMap<Uuid, MfaSecret>>,
    grants: RwLock<HashMap<Uuid, ShareGrant>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn insert_secret(&self, secret: &MfaSecret) -> Result<(), ServiceError> {
        self.secrets.write().await.insert(secret.id, secret.clone());
        Ok(())
    }

    async fn find_secret(
        &self,
        owner_id: &str,
        id: Uuid,
    ) -> Result<Option<MfaSecret>, ServiceError> {
        Ok(self
            .secrets
            .read()
            .await
            .get(&id)
            .filter(|s| s.is_owned_by(owner_id))
            .cloned())
    }

    async fn find_secret_by_id(&self, id: Uuid) -> Result<Option<MfaSecret>, ServiceError> {
        Ok(self.secrets.read().await.get(&id).cloned())
    }

    async fn list_secrets(&self, owner_id: &str) -> Result<Vec<MfaSecret>, ServiceError> {
        let mut secrets: Vec<MfaSecret> = self
            .secrets
            .read()
            .await
            .values()
            .filter(|s| s.is_owned_by(owner_id))
            .cloned()
            .collect();
        secrets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(secrets)
    }

    async fn update_secret(&self, secret: &MfaSecret) -> Result<bool, ServiceError> {
        let mut secrets = self.secrets.write().await;
        match secrets.get_mut(&secret.id) {
            Some(existing) if existing.is_owned_by(&secret.owner_id) => {
                existing.name = secret.name.clone();
                existing.secret_ciphertext = secret.secret_ciphertext.clone();
                existing.notes = secret.notes.clone();
                existing.updated_at = secret.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate_secret(&self, secret: &MfaSecret) -> Result<Option<u64>, ServiceError> {
        let mut secrets = self.secrets.write().await;
        let existing = match secrets.get_mut(&secret.id) {
            Some(existing) if existing.is_owned_by(&secret.owner_id) => existing,
            _ => return Ok(None),
        };

        let mut grants = self.grants.write().await;
        existing.name = secret.name.clone();
        existing.secret_ciphertext = secret.secret_ciphertext.clone();
        existing.notes = secret.notes.clone();
        existing.updated_at = secret.updated_at;

        let before = grants.len();
        grants.retain(|_, g| g.secret_id != secret.id);
        Ok(Some((before - grants.len()) as u64))
    }

    async fn delete_secret(&self, owner_id: &str, id: Uuid) -> Result<bool, ServiceError> {
        let mut secrets = self.secrets.write().await;
        if !secrets.get(&id).is_some_and(|s| s.is_owned_by(owner_id)) {
            return Ok(false);
        }
        secrets.remove(&id);
        self.grants.write().await.retain(|_, g| g.secret_id != id);
        Ok(true)
    }

    async fn insert_grant(&self, grant: &ShareGrant) -> Result<(), ServiceError> {
        self.grants.write().await.insert(grant.id, grant.clone());
        Ok(())
    }

    async fn find_grant_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<ShareGrant>, ServiceError> {
        Ok(self
            .grants
            .read()
            .await
            .values()
            .find(|g| g.token_hash == token_hash)
            .cloned())
    }

    async fn list_grants(&self, secret_id: Uuid) -> Result<Vec<ShareGrant>, ServiceError> {
        let mut grants: Vec<ShareGrant> = self
            .grants
            .read()
            .await
            .values()
            .filter(|g| g.secret_id == secret_id)
            .cloned()
            .collect();
        grants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(grants)
    }

    async fn delete_grant(&self, secret_id: Uuid, grant_id: Uuid) -> Result<bool, ServiceError> {
        let mut grants = self.grants.write().await;
        if !grants.get(&grant_id).is_some_and(|g| g.secret_id == secret_id) {
            return Ok(false);
        }
        grants.remove(&grant_id);
        Ok(true)
    }

    async fn delete_grants_for_secret(&self, secret_id: Uuid) -> Result<u64, ServiceError> {
        let mut grants = self.grants.write().await;
        let before = grants.len();
        grants.retain(|_, g| g.secret_id != secret_id);
        Ok((before - grants.len()) as u64)
    }
}
