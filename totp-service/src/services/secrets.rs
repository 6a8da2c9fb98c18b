//! Owner-facing secret management.
//!
//! Every operation is scoped to the calling owner. A secret that exists but
//! belongs to someone else is reported exactly like one that does not exist.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::cipher::SecretCipher;
use super::error::ServiceError;
use super::store::SecretStore;
use crate::models::MfaSecret;
use crate::totp::{build_provisioning_uri, normalize_secret, parse_provisioning_uri, TotpEngine};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_NOTES_LEN: usize = 1000;

/// Where the secret of a new entry comes from.
#[derive(Debug, Clone)]
pub enum SecretSource {
    Manual { secret: String },
    Generated,
    ProvisioningUri { uri: String },
}

#[derive(Debug, Clone)]
pub struct NewSecret {
    /// Optional for `ProvisioningUri`, where the issuer or account name is
    /// used instead.
    pub name: Option<String>,
    pub source: SecretSource,
    pub notes: Option<String>,
}

/// Partial update. `notes: Some(None)` clears the notes.
#[derive(Debug, Clone, Default)]
pub struct SecretPatch {
    pub name: Option<String>,
    pub secret: Option<String>,
    pub notes: Option<Option<String>>,
}

/// Decrypted view of a stored secret.
#[derive(Debug, Clone)]
pub struct SecretView {
    pub id: Uuid,
    pub name: String,
    pub secret: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentCode {
    pub code: String,
    pub time_remaining: u64,
    pub step_seconds: u64,
}

#[derive(Clone)]
pub struct SecretService {
    store: Arc<dyn SecretStore>,
    cipher: Arc<SecretCipher>,
    engine: TotpEngine,
    default_issuer: String,
}

impl SecretService {
    pub fn new(
        store: Arc<dyn SecretStore>,
        cipher: Arc<SecretCipher>,
        engine: TotpEngine,
        default_issuer: String,
    ) -> Self {
        Self {
            store,
            cipher,
            engine,
            default_issuer,
        }
    }

    pub fn engine(&self) -> &TotpEngine {
        &self.engine
    }

    #[tracing::instrument(skip(self, new), fields(owner_id = %owner_id))]
    pub async fn create(&self, owner_id: &str, new: NewSecret) -> Result<SecretView, ServiceError> {
        let (secret, derived_name) = match new.source {
            SecretSource::Manual { secret } => (self.validated_secret(&secret)?, None),
            SecretSource::Generated => (self.engine.generate_secret(), None),
            SecretSource::ProvisioningUri { uri } => {
                let parsed = parse_provisioning_uri(&uri)?;
                let name = parsed
                    .issuer
                    .filter(|issuer| !issuer.is_empty())
                    .or_else(|| Some(parsed.account_name).filter(|n| !n.is_empty()));
                (parsed.secret, name)
            }
        };

        let name = new
            .name
            .filter(|n| !n.trim().is_empty())
            .or(derived_name)
            .ok_or_else(|| ServiceError::Validation("name is required".to_string()))?;
        let name = validate_name(&name)?;
        let notes = validate_notes(new.notes)?;

        let mut record = MfaSecret::new(owner_id.to_string(), name, String::new(), notes);
        record.secret_ciphertext = self.cipher.encrypt(&secret, record.id.as_bytes())?;

        self.store.insert_secret(&record).await?;
        tracing::info!(secret_id = %record.id, "Secret created");

        Ok(SecretView {
            id: record.id,
            name: record.name,
            secret,
            notes: record.notes,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<SecretView>, ServiceError> {
        self.store
            .list_secrets(owner_id)
            .await?
            .into_iter()
            .map(|record| self.decrypt_view(record))
            .collect()
    }

    pub async fn get(&self, owner_id: &str, id: Uuid) -> Result<SecretView, ServiceError> {
        let record = self.find_owned(owner_id, id).await?;
        self.decrypt_view(record)
    }

    /// Apply a patch. Rotating the secret revokes every outstanding share
    /// grant, since those links were issued for the old secret.
    #[tracing::instrument(skip(self, patch), fields(owner_id = %owner_id, secret_id = %id))]
    pub async fn update(
        &self,
        owner_id: &str,
        id: Uuid,
        patch: SecretPatch,
    ) -> Result<SecretView, ServiceError> {
        let mut record = self.find_owned(owner_id, id).await?;

        if let Some(name) = patch.name {
            record.name = validate_name(&name)?;
        }
        if let Some(notes) = patch.notes {
            record.notes = validate_notes(notes)?;
        }

        let rotated = match patch.secret {
            Some(secret) => {
                let secret = self.validated_secret(&secret)?;
                record.secret_ciphertext = self.cipher.encrypt(&secret, record.id.as_bytes())?;
                true
            }
            None => false,
        };

        record.updated_at = Utc::now();
        if rotated {
            let revoked = self
                .store
                .rotate_secret(&record)
                .await?
                .ok_or(ServiceError::SecretNotFound)?;
            tracing::info!(revoked, "Secret rotated, share grants revoked");
        } else if !self.store.update_secret(&record).await? {
            return Err(ServiceError::SecretNotFound);
        }

        self.decrypt_view(record)
    }

    #[tracing::instrument(skip(self), fields(owner_id = %owner_id, secret_id = %id))]
    pub async fn delete(&self, owner_id: &str, id: Uuid) -> Result<(), ServiceError> {
        if !self.store.delete_secret(owner_id, id).await? {
            return Err(ServiceError::SecretNotFound);
        }
        tracing::info!("Secret deleted");
        Ok(())
    }

    pub async fn current_code(&self, owner_id: &str, id: Uuid) -> Result<CurrentCode, ServiceError> {
        let view = self.get(owner_id, id).await?;
        Ok(CurrentCode {
            code: self.engine.generate_code(&view.secret)?,
            time_remaining: self.engine.time_remaining(),
            step_seconds: self.engine.settings().step_seconds,
        })
    }

    pub async fn verify(&self, owner_id: &str, id: Uuid, code: &str) -> Result<bool, ServiceError> {
        let view = self.get(owner_id, id).await?;
        Ok(self.engine.verify_code(code.trim(), &view.secret)?)
    }

    pub async fn provisioning_uri(
        &self,
        owner_id: &str,
        id: Uuid,
        issuer: Option<&str>,
    ) -> Result<String, ServiceError> {
        let view = self.get(owner_id, id).await?;
        let issuer = issuer
            .filter(|i| !i.trim().is_empty())
            .unwrap_or(self.default_issuer.as_str());
        Ok(build_provisioning_uri(&view.secret, &view.name, issuer))
    }

    async fn find_owned(&self, owner_id: &str, id: Uuid) -> Result<MfaSecret, ServiceError> {
        self.store
            .find_secret(owner_id, id)
            .await?
            .ok_or(ServiceError::SecretNotFound)
    }

    /// Normalise and check that the secret can seed the engine.
    fn validated_secret(&self, secret: &str) -> Result<String, ServiceError> {
        let normalized = normalize_secret(secret);
        self.engine.generate_code_at(&normalized, 0)?;
        Ok(normalized)
    }

    fn decrypt_view(&self, record: MfaSecret) -> Result<SecretView, ServiceError> {
        let secret = self
            .cipher
            .decrypt(&record.secret_ciphertext, record.id.as_bytes())
            .map_err(|e| {
                tracing::error!(secret_id = %record.id, "Failed to decrypt stored secret: {}", e);
                e
            })?;

        Ok(SecretView {
            id: record.id,
            name: record.name,
            secret,
            notes: record.notes,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

fn validate_name(name: &str) -> Result<String, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::Validation(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_notes(notes: Option<String>) -> Result<Option<String>, ServiceError> {
    match notes {
        Some(notes) if notes.chars().count() > MAX_NOTES_LEN => Err(ServiceError::Validation(
            format!("notes must be at most {} characters", MAX_NOTES_LEN),
        )),
        Some(notes) if notes.trim().is_empty() => Ok(None),
        other => Ok(other),
    }
}
