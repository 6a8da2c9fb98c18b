//! MfaSecret model - one authenticator entry owned by one user.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored authenticator entry.
///
/// `secret_ciphertext` is the AEAD-sealed base32 secret; the plaintext is
/// only ever materialised by `SecretCipher::decrypt`.
#[derive(Debug, Clone, FromRow)]
pub struct MfaSecret {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub secret_ciphertext: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MfaSecret {
    pub fn new(
        owner_id: String,
        name: String,
        secret_ciphertext: String,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            secret_ciphertext,
            notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}
