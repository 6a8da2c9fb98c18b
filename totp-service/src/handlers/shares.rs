use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    CreateShareRequest, CreateShareResponse, RevokeSharesResponse, ShareGrantListResponse,
    ShareGrantResponse,
};
use crate::middleware::AuthUser;
use crate::AppState;

/// GET /api/secrets/:id/shares
pub async fn list_shares(
    State(state): State<AppState>,
    user: AuthUser,
    Path(secret_id): Path<Uuid>,
) -> Result<Json<ShareGrantListResponse>, AppError> {
    let grants = state.shares.list_grants(user.owner_id(), secret_id).await?;
    Ok(Json(ShareGrantListResponse {
        grants: grants.into_iter().map(ShareGrantResponse::from).collect(),
    }))
}

/// POST /api/secrets/:id/shares
///
/// The token in the response is shown once; only its hash is kept.
pub async fn create_share(
    State(state): State<AppState>,
    user: AuthUser,
    Path(secret_id): Path<Uuid>,
    Json(req): Json<CreateShareRequest>,
) -> Result<(StatusCode, Json<CreateShareResponse>), AppError> {
    req.validate()?;
    let created = state
        .shares
        .create_grant(user.owner_id(), secret_id, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// DELETE /api/secrets/:id/shares
pub async fn revoke_shares(
    State(state): State<AppState>,
    user: AuthUser,
    Path(secret_id): Path<Uuid>,
) -> Result<Json<RevokeSharesResponse>, AppError> {
    let revoked = state.shares.revoke_grant(user.owner_id(), secret_id).await?;
    Ok(Json(RevokeSharesResponse { revoked }))
}

/// DELETE /api/secrets/:id/shares/:grant_id
pub async fn revoke_share(
    State(state): State<AppState>,
    user: AuthUser,
    Path((secret_id, grant_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .shares
        .revoke_single(user.owner_id(), secret_id, grant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
