//! Test helpers for totp-service integration tests.
//!
//! The app runs against the in-memory store and an HS256 identity
//! provider key, so no database or external IdP is needed.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use secrecy::Secret;
use serde::Serialize;
use serde_json::Value;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::init_metrics;
use std::sync::Arc;
use totp_service::{
    build_router,
    config::{
        DatabaseConfig, EncryptionConfig, Environment, IdentityConfig, RateLimitConfig,
        SecurityConfig, ShareConfig, TotpServiceConfig,
    },
    middleware::IdentityVerifier,
    services::{InMemoryStore, SecretCipher, SecretService, SecretStore, ShareService, ShareSettings},
    totp::TotpEngine,
    AppState,
};
use tower::util::ServiceExt;

pub const TEST_IDP_SECRET: &str = "test-idp-secret";
pub const TEST_ISSUER: &str = "https://idp.test";
pub const TEST_BASE_URL: &str = "https://vault.test";

pub fn create_test_config() -> TotpServiceConfig {
    TotpServiceConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "totp-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: Secret::new("postgres://unused".to_string()),
            max_connections: 1,
            min_connections: 1,
        },
        encryption: EncryptionConfig {
            secret_key: Secret::new(SecretCipher::generate_key()),
        },
        identity: IdentityConfig {
            jwt_secret: Some(Secret::new(TEST_IDP_SECRET.to_string())),
            jwt_public_key_path: None,
            issuer: Some(TEST_ISSUER.to_string()),
            audience: None,
        },
        share: ShareConfig {
            public_base_url: TEST_BASE_URL.to_string(),
            default_expiration_hours: 24,
            max_expiration_hours: 720,
        },
        security: SecurityConfig {
            allowed_origins: vec![TEST_BASE_URL.to_string()],
        },
        rate_limit: RateLimitConfig {
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
            redeem_attempts: 1_000,
            redeem_window_seconds: 60,
        },
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(create_test_config())
    }

    pub fn with_config(config: TotpServiceConfig) -> Self {
        let store: Arc<dyn SecretStore> = Arc::new(InMemoryStore::new());
        let cipher = Arc::new(
            SecretCipher::from_base64_key(&config.encryption.secret_key)
                .expect("Failed to build cipher"),
        );
        let identity = Arc::new(
            IdentityVerifier::from_config(&config.identity).expect("Failed to build verifier"),
        );

        let secrets = SecretService::new(
            store.clone(),
            cipher.clone(),
            TotpEngine::default(),
            config.service_name.clone(),
        );
        let shares = ShareService::new(
            store.clone(),
            cipher,
            ShareSettings {
                public_base_url: config.share.public_base_url.clone(),
                default_expiration_hours: config.share.default_expiration_hours,
                max_expiration_hours: config.share.max_expiration_hours,
            },
        );

        let state = AppState {
            ip_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.global_ip_limit,
                config.rate_limit.global_ip_window_seconds,
            ),
            redeem_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.redeem_attempts,
                config.rate_limit.redeem_window_seconds,
            ),
            config: Arc::new(config),
            store,
            secrets,
            shares,
            identity,
            metrics: init_metrics(),
        };

        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    /// Send a request; `token` is an identity provider bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.request_with_headers(method, uri, token, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        extra_headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Create a manual secret for `owner` and return its id.
    pub async fn create_secret(&self, owner_token: &str, name: &str, secret: &str) -> String {
        let res = self
            .request(
                Method::POST,
                "/api/secrets",
                Some(owner_token),
                Some(serde_json::json!({ "name": name, "secret": secret, "notes": "shared login" })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "create failed: {}", res.body);
        res.body["id"].as_str().unwrap().to_string()
    }
}

/// Mint an identity provider token for `sub`.
pub fn user_token(sub: &str) -> String {
    user_token_with(sub, TEST_ISSUER, 3600, TEST_IDP_SECRET)
}

pub fn user_token_with(sub: &str, iss: &str, ttl_seconds: i64, key: &str) -> String {
    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        iss: &'a str,
        exp: i64,
    }

    let exp = chrono::Utc::now().timestamp() + ttl_seconds;
    encode(
        &Header::default(),
        &Claims { sub, iss, exp },
        &EncodingKey::from_secret(key.as_bytes()),
    )
    .unwrap()
}
