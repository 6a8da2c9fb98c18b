use service_core::error::AppError;
use thiserror::Error;

use crate::totp::TotpError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid secret format")]
    InvalidSecretFormat,

    #[error("Malformed provisioning URI: {0}")]
    MalformedUri(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Secret not found")]
    SecretNotFound,

    #[error("Share grant not found")]
    GrantNotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TotpError> for ServiceError {
    fn from(err: TotpError) -> Self {
        match err {
            TotpError::InvalidSecretFormat => ServiceError::InvalidSecretFormat,
            TotpError::MalformedUri(reason) => ServiceError::MalformedUri(reason),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidSecretFormat => {
                AppError::BadRequest(anyhow::anyhow!("Invalid secret format"))
            }
            ServiceError::MalformedUri(reason) => {
                AppError::BadRequest(anyhow::anyhow!("Malformed provisioning URI: {}", reason))
            }
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::SecretNotFound => AppError::NotFound(anyhow::anyhow!("Secret not found")),
            ServiceError::GrantNotFound => {
                AppError::NotFound(anyhow::anyhow!("Share grant not found"))
            }
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Crypto(e) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
