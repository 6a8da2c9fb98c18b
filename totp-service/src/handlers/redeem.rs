//! Public, unauthenticated share redemption.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{RedeemQuery, RedeemRequest, RedemptionResponse, SharedSecretResponse};
use crate::services::{DenialReason, RedemptionOutcome};
use crate::AppState;

/// Evaluate one attempt and map the outcome onto an HTTP response.
pub async fn redeem_impl(
    state: &AppState,
    token: &str,
    password: Option<&str>,
) -> Result<Response, AppError> {
    let outcome = state.shares.redeem(token, password).await?;
    let status = outcome.status();

    let (code, secret, message) = match outcome {
        RedemptionOutcome::Granted(shared) => (
            StatusCode::OK,
            Some(SharedSecretResponse::new(
                shared,
                state.secrets.engine().settings(),
            )),
            None,
        ),
        RedemptionOutcome::PasswordRequired => (
            StatusCode::UNAUTHORIZED,
            None,
            Some("This share is password protected"),
        ),
        RedemptionOutcome::Denied(DenialReason::InvalidToken) => (
            StatusCode::NOT_FOUND,
            None,
            Some("This share link is invalid"),
        ),
        RedemptionOutcome::Denied(DenialReason::Expired) => {
            (StatusCode::GONE, None, Some("This share link has expired"))
        }
        RedemptionOutcome::Denied(DenialReason::WrongPassword) => {
            (StatusCode::FORBIDDEN, None, Some("Incorrect password"))
        }
    };

    Ok((
        code,
        Json(RedemptionResponse {
            status,
            secret,
            message,
        }),
    )
        .into_response())
}

/// GET /api/share/:token
///
/// `?p=` carries a password embedded in the link.
pub async fn redeem_share(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<RedeemQuery>,
) -> Result<Response, AppError> {
    redeem_impl(&state, &token, query.p.as_deref()).await
}

/// POST /api/share/:token
pub async fn redeem_share_with_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<RedeemRequest>,
) -> Result<Response, AppError> {
    redeem_impl(&state, &token, req.password.as_deref()).await
}
