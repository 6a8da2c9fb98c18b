use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{GenerateSecretQuery, GenerateSecretResponse, ParseUriRequest, ParseUriResponse};
use crate::middleware::AuthUser;
use crate::services::ServiceError;
use crate::totp::{build_provisioning_uri, parse_provisioning_uri};
use crate::AppState;

/// POST /api/totp/secret
///
/// Fresh secret, plus a provisioning URI when `account_name` is given.
pub async fn generate_secret(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<GenerateSecretQuery>,
) -> Result<Json<GenerateSecretResponse>, AppError> {
    query.validate()?;
    let secret = state.secrets.engine().generate_secret();
    let provisioning_uri = query.account_name.as_deref().map(|account| {
        let issuer = query
            .issuer
            .as_deref()
            .unwrap_or(state.config.service_name.as_str());
        build_provisioning_uri(&secret, account, issuer)
    });

    Ok(Json(GenerateSecretResponse {
        secret,
        provisioning_uri,
    }))
}

/// POST /api/totp/parse-uri
pub async fn parse_uri(
    _user: AuthUser,
    Json(req): Json<ParseUriRequest>,
) -> Result<Json<ParseUriResponse>, AppError> {
    req.validate()?;
    let parsed = parse_provisioning_uri(&req.uri).map_err(ServiceError::from)?;
    Ok(Json(parsed.into()))
}
