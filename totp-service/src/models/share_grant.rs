//! ShareGrant model - a token-addressed invitation to view one secret's
//! live codes without signing in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Password policy of a grant.
///
/// The two flags are independent. `embed_password_in_link` makes the link
/// itself the credential, so redemption never prompts even when
/// `require_password` is also set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePolicy {
    #[serde(default)]
    pub require_password: bool,
    #[serde(default)]
    pub embed_password_in_link: bool,
}

impl SharePolicy {
    /// Whether a grant needs a password hash at all.
    pub fn uses_password(&self) -> bool {
        self.require_password || self.embed_password_in_link
    }

    /// Whether redemption must check a caller-supplied password.
    pub fn prompts_for_password(&self) -> bool {
        self.require_password && !self.embed_password_in_link
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ShareGrant {
    pub id: Uuid,
    pub secret_id: Uuid,
    pub owner_id: String,
    /// Hex SHA-256 of the share token.
    pub token_hash: String,
    pub password_hash: Option<String>,
    pub require_password: bool,
    pub embed_password_in_link: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ShareGrant {
    pub fn new(
        secret_id: Uuid,
        owner_id: String,
        token_hash: String,
        password_hash: Option<String>,
        policy: SharePolicy,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            secret_id,
            owner_id,
            token_hash,
            password_hash,
            require_password: policy.require_password,
            embed_password_in_link: policy.embed_password_in_link,
            expires_at,
            created_at: Utc::now(),
        }
    }

    pub fn policy(&self) -> SharePolicy {
        SharePolicy {
            require_password: self.require_password,
            embed_password_in_link: self.embed_password_in_link,
        }
    }

    /// A grant is expired from its expiration instant onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant(policy: SharePolicy, expires_at: DateTime<Utc>) -> ShareGrant {
        ShareGrant::new(
            Uuid::new_v4(),
            "owner".to_string(),
            "hash".to_string(),
            None,
            policy,
            expires_at,
        )
    }

    #[test]
    fn expiry_boundary() {
        let now = Utc::now();
        let g = grant(SharePolicy::default(), now + Duration::seconds(1));
        assert!(!g.is_expired_at(now));
        assert!(g.is_expired_at(now + Duration::seconds(1)));
        assert!(g.is_expired_at(now + Duration::seconds(2)));
    }

    #[test]
    fn embedded_password_never_prompts() {
        let policy = SharePolicy {
            require_password: true,
            embed_password_in_link: true,
        };
        assert!(policy.uses_password());
        assert!(!policy.prompts_for_password());

        let g = grant(policy, Utc::now());
        assert_eq!(g.policy(), policy);
    }

    #[test]
    fn open_policy_uses_no_password() {
        let policy = SharePolicy::default();
        assert!(!policy.uses_password());
        assert!(!policy.prompts_for_password());
    }
}
