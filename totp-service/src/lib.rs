//! totp-service: authenticator secret vault with expiring share links.

pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod totp;
pub mod utils;

use axum::{
    extract::{MatchedPath, State},
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use service_core::observability::MetricsHandle;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::TotpServiceConfig;
use crate::middleware::IdentityVerifier;
use crate::services::{SecretService, SecretStore, ShareService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TotpServiceConfig>,
    pub store: Arc<dyn SecretStore>,
    pub secrets: SecretService,
    pub shares: ShareService,
    pub identity: Arc<IdentityVerifier>,
    pub metrics: MetricsHandle,
    pub ip_rate_limiter: IpRateLimiter,
    pub redeem_rate_limiter: IpRateLimiter,
}

pub fn build_router(state: AppState) -> Router {
    // Owner routes, behind the identity provider token
    let owner_routes = Router::new()
        .route(
            "/api/secrets",
            get(handlers::list_secrets).post(handlers::create_secret),
        )
        .route(
            "/api/secrets/:id",
            get(handlers::get_secret)
                .patch(handlers::update_secret)
                .delete(handlers::delete_secret),
        )
        .route("/api/secrets/:id/code", get(handlers::get_code))
        .route("/api/secrets/:id/verify", post(handlers::verify_code))
        .route(
            "/api/secrets/:id/provisioning-uri",
            get(handlers::get_provisioning_uri),
        )
        .route(
            "/api/secrets/:id/shares",
            get(handlers::list_shares)
                .post(handlers::create_share)
                .delete(handlers::revoke_shares),
        )
        .route(
            "/api/secrets/:id/shares/:grant_id",
            delete(handlers::revoke_share),
        )
        .route("/api/totp/secret", post(handlers::generate_secret))
        .route("/api/totp/parse-uri", post(handlers::parse_uri))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Public redemption, with its own tighter per-IP budget
    let redeem_routes = Router::new()
        .route(
            "/api/share/:token",
            get(handlers::redeem_share).post(handlers::redeem_share_with_password),
        )
        .layer(from_fn_with_state(
            state.redeem_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();
    let cors = cors_layer(&state.config.security.allowed_origins);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(owner_routes)
        .merge(redeem_routes)
        .with_state(state)
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(from_fn(metrics_middleware))
        // The span records the route template, never the raw URI: share
        // tokens and embedded passwords travel in the path and query.
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            let route = request
                .extensions()
                .get::<MatchedPath>()
                .map(|p| p.as_str())
                .unwrap_or("unmatched");

            tracing::info_span!(
                "http_request",
                request_id = %request_id,
                method = %request.method(),
                route = %route,
                version = ?request.version(),
            )
        }))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}
