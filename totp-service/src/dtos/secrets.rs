use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::services::{CurrentCode, NewSecret, SecretPatch, SecretSource, SecretView};

/// Exactly one of `secret`, `uri` or `generate` selects the source.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSecretRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 256, message = "Secret must be 1-256 characters"))]
    pub secret: Option<String>,

    #[validate(length(min = 1, max = 2048, message = "URI must be 1-2048 characters"))]
    pub uri: Option<String>,

    #[serde(default)]
    pub generate: bool,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

impl CreateSecretRequest {
    pub fn into_new_secret(self) -> Result<NewSecret, AppError> {
        let source = match (self.secret, self.uri, self.generate) {
            (Some(secret), None, false) => SecretSource::Manual { secret },
            (None, Some(uri), false) => SecretSource::ProvisioningUri { uri },
            (None, None, true) => SecretSource::Generated,
            _ => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Provide exactly one of 'secret', 'uri' or 'generate'"
                )))
            }
        };

        Ok(NewSecret {
            name: self.name,
            source,
            notes: self.notes,
        })
    }
}

/// An empty `notes` string clears the notes.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSecretRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 256, message = "Secret must be 1-256 characters"))]
    pub secret: Option<String>,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

impl From<UpdateSecretRequest> for SecretPatch {
    fn from(req: UpdateSecretRequest) -> Self {
        SecretPatch {
            name: req.name,
            secret: req.secret,
            notes: req.notes.map(Some),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SecretResponse {
    pub id: Uuid,
    pub name: String,
    pub secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SecretView> for SecretResponse {
    fn from(view: SecretView) -> Self {
        Self {
            id: view.id,
            name: view.name,
            secret: view.secret,
            notes: view.notes,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

/// List entry; the secret itself is only returned by the single-item read.
#[derive(Debug, Serialize)]
pub struct SecretSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SecretView> for SecretSummary {
    fn from(view: SecretView) -> Self {
        Self {
            id: view.id,
            name: view.name,
            notes: view.notes,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SecretListResponse {
    pub secrets: Vec<SecretSummary>,
}

#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub code: String,
    pub time_remaining: u64,
    pub step_seconds: u64,
}

impl From<CurrentCode> for CodeResponse {
    fn from(code: CurrentCode) -> Self {
        Self {
            code: code.code,
            time_remaining: code.time_remaining,
            step_seconds: code.step_seconds,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyCodeRequest {
    #[validate(length(min = 1, max = 16, message = "Code must be 1-16 characters"))]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProvisioningUriQuery {
    pub issuer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProvisioningUriResponse {
    pub uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(secret: Option<&str>, uri: Option<&str>, generate: bool) -> CreateSecretRequest {
        CreateSecretRequest {
            name: Some("GitHub".to_string()),
            secret: secret.map(str::to_string),
            uri: uri.map(str::to_string),
            generate,
            notes: None,
        }
    }

    #[test]
    fn exactly_one_source_is_required() {
        assert!(matches!(
            request(Some("JBSWY3DPEHPK3PXP"), None, false).into_new_secret().unwrap().source,
            SecretSource::Manual { .. }
        ));
        assert!(matches!(
            request(None, Some("otpauth://totp/a?secret=JBSWY3DPEHPK3PXP"), false)
                .into_new_secret()
                .unwrap()
                .source,
            SecretSource::ProvisioningUri { .. }
        ));
        assert!(matches!(
            request(None, None, true).into_new_secret().unwrap().source,
            SecretSource::Generated
        ));

        assert!(request(None, None, false).into_new_secret().is_err());
        assert!(request(Some("JBSWY3DPEHPK3PXP"), None, true).into_new_secret().is_err());
        assert!(request(Some("x"), Some("y"), false).into_new_secret().is_err());
    }

    #[test]
    fn empty_notes_patch_clears() {
        let patch = SecretPatch::from(UpdateSecretRequest {
            name: None,
            secret: None,
            notes: Some(String::new()),
        });
        assert_eq!(patch.notes, Some(Some(String::new())));
    }
}
