use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    CodeResponse, CreateSecretRequest, ProvisioningUriQuery, ProvisioningUriResponse,
    SecretListResponse, SecretResponse, SecretSummary, UpdateSecretRequest, VerifyCodeRequest,
    VerifyCodeResponse,
};
use crate::middleware::AuthUser;
use crate::AppState;

/// GET /api/secrets
pub async fn list_secrets(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<SecretListResponse>, AppError> {
    let secrets = state.secrets.list(user.owner_id()).await?;
    Ok(Json(SecretListResponse {
        secrets: secrets.into_iter().map(SecretSummary::from).collect(),
    }))
}

/// POST /api/secrets
pub async fn create_secret(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSecretRequest>,
) -> Result<(StatusCode, Json<SecretResponse>), AppError> {
    req.validate()?;
    let new = req.into_new_secret()?;
    let view = state.secrets.create(user.owner_id(), new).await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// GET /api/secrets/:id
pub async fn get_secret(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SecretResponse>, AppError> {
    let view = state.secrets.get(user.owner_id(), id).await?;
    Ok(Json(view.into()))
}

/// PATCH /api/secrets/:id
pub async fn update_secret(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSecretRequest>,
) -> Result<Json<SecretResponse>, AppError> {
    req.validate()?;
    let view = state.secrets.update(user.owner_id(), id, req.into()).await?;
    Ok(Json(view.into()))
}

/// DELETE /api/secrets/:id
pub async fn delete_secret(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.secrets.delete(user.owner_id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/secrets/:id/code
pub async fn get_code(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CodeResponse>, AppError> {
    let code = state.secrets.current_code(user.owner_id(), id).await?;
    Ok(Json(code.into()))
}

/// POST /api/secrets/:id/verify
pub async fn verify_code(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, AppError> {
    req.validate()?;
    let valid = state.secrets.verify(user.owner_id(), id, &req.code).await?;
    Ok(Json(VerifyCodeResponse { valid }))
}

/// GET /api/secrets/:id/provisioning-uri
pub async fn get_provisioning_uri(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ProvisioningUriQuery>,
) -> Result<Json<ProvisioningUriResponse>, AppError> {
    let uri = state
        .secrets
        .provisioning_uri(user.owner_id(), id, query.issuer.as_deref())
        .await?;
    Ok(Json(ProvisioningUriResponse { uri }))
}
