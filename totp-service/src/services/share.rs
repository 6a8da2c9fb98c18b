//! Share grants and the public redemption flow.
//!
//! A grant is addressed only by its opaque token. Redemption is evaluated
//! fresh on every attempt, in this order:
//!
//! 1. unknown token -> `Denied(InvalidToken)`
//! 2. expired -> `Denied(Expired)`
//! 3. password required and not embedded in the link:
//!    no password -> `PasswordRequired`, mismatch -> `Denied(WrongPassword)`
//! 4. otherwise -> `Granted` with the decrypted secret
//!
//! Only infrastructure failures are returned as `Err`.

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use std::sync::Arc;
use uuid::Uuid;

use super::cipher::SecretCipher;
use super::error::ServiceError;
use super::store::SecretStore;
use crate::models::{SharePolicy, ShareGrant};
use crate::utils::{
    generate_share_token, hash_password, hash_share_token, verify_password, Password,
    PasswordHashString,
};

pub const MIN_SHARE_PASSWORD_LEN: usize = 4;
pub const MAX_SHARE_PASSWORD_LEN: usize = 128;

pub const EMBEDDED_PASSWORD_WARNING: &str = "The password is embedded in the share link. \
Anyone who sees the link (browser history, referrer headers, server logs) can open it.";

#[derive(Debug, Clone)]
pub struct ShareSettings {
    /// Scheme and host share URLs are built on, e.g. `https://vault.example.com`.
    pub public_base_url: String,
    pub default_expiration_hours: u32,
    pub max_expiration_hours: u32,
}

#[derive(Debug, Clone, Default)]
pub struct CreateGrantRequest {
    pub policy: SharePolicy,
    pub password: Option<String>,
    pub expiration_hours: Option<u32>,
}

/// Returned once at creation; the plaintext token is not stored.
#[derive(Debug, Clone)]
pub struct CreatedGrant {
    pub grant_id: Uuid,
    pub token: String,
    pub share_url: String,
    pub policy: SharePolicy,
    pub expires_at: DateTime<Utc>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GrantSummary {
    pub id: Uuid,
    pub policy: SharePolicy,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<ShareGrant> for GrantSummary {
    fn from(grant: ShareGrant) -> Self {
        Self {
            id: grant.id,
            policy: grant.policy(),
            expires_at: grant.expires_at,
            created_at: grant.created_at,
        }
    }
}

/// What a recipient receives on a successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSecret {
    pub id: Uuid,
    pub name: String,
    pub secret: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// Never existed, revoked, or its secret is gone. Not distinguished.
    InvalidToken,
    Expired,
    WrongPassword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionOutcome {
    Granted(SharedSecret),
    PasswordRequired,
    Denied(DenialReason),
}

impl RedemptionOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            RedemptionOutcome::Granted(_) => "granted",
            RedemptionOutcome::PasswordRequired => "password_required",
            RedemptionOutcome::Denied(DenialReason::InvalidToken) => "invalid_token",
            RedemptionOutcome::Denied(DenialReason::Expired) => "expired",
            RedemptionOutcome::Denied(DenialReason::WrongPassword) => "wrong_password",
        }
    }
}

#[derive(Clone)]
pub struct ShareService {
    store: Arc<dyn SecretStore>,
    cipher: Arc<SecretCipher>,
    settings: ShareSettings,
}

impl ShareService {
    pub fn new(store: Arc<dyn SecretStore>, cipher: Arc<SecretCipher>, settings: ShareSettings) -> Self {
        Self {
            store,
            cipher,
            settings,
        }
    }

    /// Issue a new share link for one of the owner's secrets.
    #[tracing::instrument(skip(self, request), fields(owner_id = %owner_id, secret_id = %secret_id))]
    pub async fn create_grant(
        &self,
        owner_id: &str,
        secret_id: Uuid,
        request: CreateGrantRequest,
    ) -> Result<CreatedGrant, ServiceError> {
        let hours = request
            .expiration_hours
            .unwrap_or(self.settings.default_expiration_hours);
        if hours == 0 || hours > self.settings.max_expiration_hours {
            return Err(ServiceError::Validation(format!(
                "expiration_hours must be between 1 and {}",
                self.settings.max_expiration_hours
            )));
        }

        let policy = request.policy;
        let password = if policy.uses_password() {
            let password = request.password.unwrap_or_default();
            validate_share_password(&password)?;
            Some(Password::new(password))
        } else {
            None
        };

        self.store
            .find_secret(owner_id, secret_id)
            .await?
            .ok_or(ServiceError::SecretNotFound)?;

        let password_hash = match &password {
            Some(password) => Some(hash_blocking(password.clone()).await?.into_string()),
            None => None,
        };

        let token = generate_share_token();
        let expires_at = Utc::now()
            .checked_add_signed(Duration::hours(i64::from(hours)))
            .ok_or_else(|| {
                ServiceError::Validation("expiration_hours is out of range".to_string())
            })?;
        let grant = ShareGrant::new(
            secret_id,
            owner_id.to_string(),
            hash_share_token(token.as_str()),
            password_hash,
            policy,
            expires_at,
        );
        self.store.insert_grant(&grant).await?;

        counter!("share_grants_created_total").increment(1);
        tracing::info!(
            grant_id = %grant.id,
            require_password = policy.require_password,
            embed_password_in_link = policy.embed_password_in_link,
            expires_at = %expires_at,
            "Share grant created"
        );

        let embedded = match (&password, policy.embed_password_in_link) {
            (Some(password), true) => Some(password.as_str()),
            _ => None,
        };
        let share_url = self.share_url(token.as_str(), embedded);

        Ok(CreatedGrant {
            grant_id: grant.id,
            token: token.into_string(),
            share_url,
            policy,
            expires_at,
            warning: embedded.map(|_| EMBEDDED_PASSWORD_WARNING.to_string()),
        })
    }

    /// Active (unexpired) grants of one of the owner's secrets.
    pub async fn list_grants(
        &self,
        owner_id: &str,
        secret_id: Uuid,
    ) -> Result<Vec<GrantSummary>, ServiceError> {
        self.ensure_owned(owner_id, secret_id).await?;
        let now = Utc::now();
        Ok(self
            .store
            .list_grants(secret_id)
            .await?
            .into_iter()
            .filter(|g| !g.is_expired_at(now))
            .map(GrantSummary::from)
            .collect())
    }

    /// Invalidate every outstanding link for the secret.
    #[tracing::instrument(skip(self), fields(owner_id = %owner_id, secret_id = %secret_id))]
    pub async fn revoke_grant(&self, owner_id: &str, secret_id: Uuid) -> Result<u64, ServiceError> {
        self.ensure_owned(owner_id, secret_id).await?;
        let revoked = self.store.delete_grants_for_secret(secret_id).await?;
        tracing::info!(revoked, "Share grants revoked");
        Ok(revoked)
    }

    #[tracing::instrument(skip(self), fields(owner_id = %owner_id, secret_id = %secret_id, grant_id = %grant_id))]
    pub async fn revoke_single(
        &self,
        owner_id: &str,
        secret_id: Uuid,
        grant_id: Uuid,
    ) -> Result<(), ServiceError> {
        self.ensure_owned(owner_id, secret_id).await?;
        if !self.store.delete_grant(secret_id, grant_id).await? {
            return Err(ServiceError::GrantNotFound);
        }
        tracing::info!("Share grant revoked");
        Ok(())
    }

    pub async fn redeem(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> Result<RedemptionOutcome, ServiceError> {
        self.redeem_at(token, password, Utc::now()).await
    }

    /// Evaluate one redemption attempt as if the clock read `now`.
    pub async fn redeem_at(
        &self,
        token: &str,
        password: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RedemptionOutcome, ServiceError> {
        let outcome = self.evaluate(token, password, now).await?;
        counter!("share_redemptions_total", "outcome" => outcome.status()).increment(1);
        tracing::info!(outcome = outcome.status(), "Share redemption evaluated");
        Ok(outcome)
    }

    async fn evaluate(
        &self,
        token: &str,
        password: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RedemptionOutcome, ServiceError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(RedemptionOutcome::Denied(DenialReason::InvalidToken));
        }

        let grant = match self
            .store
            .find_grant_by_token_hash(&hash_share_token(token))
            .await?
        {
            Some(grant) => grant,
            None => return Ok(RedemptionOutcome::Denied(DenialReason::InvalidToken)),
        };

        if grant.is_expired_at(now) {
            tracing::debug!(grant_id = %grant.id, "Share grant expired");
            return Ok(RedemptionOutcome::Denied(DenialReason::Expired));
        }

        if grant.policy().prompts_for_password() {
            let supplied = match password.filter(|p| !p.is_empty()) {
                Some(p) => p,
                None => return Ok(RedemptionOutcome::PasswordRequired),
            };

            let hash = grant.password_hash.clone().ok_or_else(|| {
                tracing::error!(grant_id = %grant.id, "Password-protected grant has no hash");
                ServiceError::Internal(anyhow::anyhow!("share grant is missing its password hash"))
            })?;

            let matched = verify_blocking(
                Password::new(supplied.to_string()),
                PasswordHashString::new(hash),
            )
            .await?;
            if !matched {
                return Ok(RedemptionOutcome::Denied(DenialReason::WrongPassword));
            }
        }

        // The grant can outlive its secret only across a concurrent delete.
        let secret = match self.store.find_secret_by_id(grant.secret_id).await? {
            Some(secret) => secret,
            None => return Ok(RedemptionOutcome::Denied(DenialReason::InvalidToken)),
        };

        let plaintext = self
            .cipher
            .decrypt(&secret.secret_ciphertext, secret.id.as_bytes())
            .map_err(|e| {
                tracing::error!(secret_id = %secret.id, "Failed to decrypt shared secret: {}", e);
                e
            })?;

        Ok(RedemptionOutcome::Granted(SharedSecret {
            id: secret.id,
            name: secret.name,
            secret: plaintext,
            notes: secret.notes,
            created_at: secret.created_at,
        }))
    }

    async fn ensure_owned(&self, owner_id: &str, secret_id: Uuid) -> Result<(), ServiceError> {
        self.store
            .find_secret(owner_id, secret_id)
            .await?
            .map(|_| ())
            .ok_or(ServiceError::SecretNotFound)
    }

    fn share_url(&self, token: &str, embedded_password: Option<&str>) -> String {
        let base = self.settings.public_base_url.trim_end_matches('/');
        match embedded_password {
            Some(password) => format!(
                "{}/share/{}?p={}",
                base,
                token,
                urlencoding::encode(password)
            ),
            None => format!("{}/share/{}", base, token),
        }
    }
}

fn validate_share_password(password: &str) -> Result<(), ServiceError> {
    let len = password.chars().count();
    if len < MIN_SHARE_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "a password of at least {} characters is required for this share policy",
            MIN_SHARE_PASSWORD_LEN
        )));
    }
    if len > MAX_SHARE_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "password must be at most {} characters",
            MAX_SHARE_PASSWORD_LEN
        )));
    }
    Ok(())
}

// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_blocking(password: Password) -> Result<PasswordHashString, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::Internal(e.into()))?
        .map_err(ServiceError::Internal)
}

async fn verify_blocking(
    password: Password,
    hash: PasswordHashString,
) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServiceError::Internal(e.into()))?
        .map_err(ServiceError::Internal)
}
