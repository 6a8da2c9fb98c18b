use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::SharePolicy;
use crate::services::{CreateGrantRequest, CreatedGrant, GrantSummary, SharedSecret};
use crate::totp::TotpSettings;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateShareRequest {
    #[serde(default)]
    pub require_password: bool,

    #[serde(default)]
    pub embed_password_in_link: bool,

    #[validate(length(max = 128, message = "Password must be at most 128 characters"))]
    pub password: Option<String>,

    #[validate(range(min = 1, message = "expiration_hours must be at least 1"))]
    pub expiration_hours: Option<u32>,
}

impl From<CreateShareRequest> for CreateGrantRequest {
    fn from(req: CreateShareRequest) -> Self {
        CreateGrantRequest {
            policy: SharePolicy {
                require_password: req.require_password,
                embed_password_in_link: req.embed_password_in_link,
            },
            password: req.password,
            expiration_hours: req.expiration_hours,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateShareResponse {
    pub grant_id: Uuid,
    pub token: String,
    pub share_url: String,
    pub require_password: bool,
    pub embed_password_in_link: bool,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<CreatedGrant> for CreateShareResponse {
    fn from(grant: CreatedGrant) -> Self {
        Self {
            grant_id: grant.grant_id,
            token: grant.token,
            share_url: grant.share_url,
            require_password: grant.policy.require_password,
            embed_password_in_link: grant.policy.embed_password_in_link,
            expires_at: grant.expires_at,
            warning: grant.warning,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShareGrantResponse {
    pub id: Uuid,
    pub require_password: bool,
    pub embed_password_in_link: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<GrantSummary> for ShareGrantResponse {
    fn from(grant: GrantSummary) -> Self {
        Self {
            id: grant.id,
            require_password: grant.policy.require_password,
            embed_password_in_link: grant.policy.embed_password_in_link,
            expires_at: grant.expires_at,
            created_at: grant.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShareGrantListResponse {
    pub grants: Vec<ShareGrantResponse>,
}

#[derive(Debug, Serialize)]
pub struct RevokeSharesResponse {
    pub revoked: u64,
}

/// Embedded password carried by a share URL as `?p=`.
#[derive(Debug, Deserialize)]
pub struct RedeemQuery {
    pub p: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub password: Option<String>,
}

/// Everything a recipient's client needs to derive codes locally.
#[derive(Debug, Serialize)]
pub struct SharedSecretResponse {
    pub id: Uuid,
    pub name: String,
    pub secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub digits: u32,
    pub period: u64,
}

impl SharedSecretResponse {
    pub fn new(shared: SharedSecret, settings: &TotpSettings) -> Self {
        Self {
            id: shared.id,
            name: shared.name,
            secret: shared.secret,
            notes: shared.notes,
            created_at: shared.created_at,
            digits: settings.digits,
            period: settings.step_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RedemptionResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<SharedSecretResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}
