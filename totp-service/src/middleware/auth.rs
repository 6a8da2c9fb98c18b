//! Bearer-token authentication against the external identity provider.
//!
//! The provider issues the JWT; this service only verifies it and takes
//! `sub` as the owner id of every secret.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::fs;

use crate::config::IdentityConfig;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct IdentityVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl IdentityVerifier {
    pub fn from_config(config: &IdentityConfig) -> Result<Self, anyhow::Error> {
        let (decoding_key, algorithm) = match (&config.jwt_public_key_path, &config.jwt_secret) {
            (Some(path), _) => {
                let pem = fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("Failed to read identity provider key {}: {}", path, e)
                })?;
                let key = DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;
                (key, Algorithm::RS256)
            }
            (None, Some(secret)) => (
                DecodingKey::from_secret(secret.expose_secret().as_bytes()),
                Algorithm::HS256,
            ),
            (None, None) => {
                return Err(anyhow::anyhow!(
                    "No identity provider verification key configured"
                ))
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }

        tracing::info!(algorithm = ?algorithm, "Identity verifier initialized");
        Ok(Self {
            decoding_key,
            validation,
        })
    }

    pub fn verify(&self, token: &str) -> Result<IdentityClaims, anyhow::Error> {
        let data = decode::<IdentityClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| anyhow::anyhow!("Invalid access token: {}", e))?;

        if data.claims.sub.trim().is_empty() {
            return Err(anyhow::anyhow!("Access token has no subject"));
        }
        Ok(data.claims)
    }
}

/// Middleware to require an identity provider token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state.identity.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// The authenticated owner, taken from claims placed by [`auth_middleware`].
pub struct AuthUser(pub IdentityClaims);

impl AuthUser {
    pub fn owner_id(&self) -> &str {
        &self.0.sub
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<IdentityClaims>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Auth claims missing from request extensions"
            ))
        })?;

        Ok(AuthUser(claims.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use secrecy::Secret;

    const SECRET: &str = "idp-test-secret";

    fn config() -> IdentityConfig {
        IdentityConfig {
            jwt_secret: Some(Secret::new(SECRET.to_string())),
            jwt_public_key_path: None,
            issuer: Some("https://idp.example.com".to_string()),
            audience: None,
        }
    }

    fn token(sub: &str, iss: &str, exp_offset: i64, key: &str) -> String {
        #[derive(Serialize)]
        struct Claims<'a> {
            sub: &'a str,
            iss: &'a str,
            exp: i64,
        }
        let exp = chrono::Utc::now().timestamp() + exp_offset;
        encode(
            &Header::default(),
            &Claims { sub, iss, exp },
            &EncodingKey::from_secret(key.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_token() {
        let verifier = IdentityVerifier::from_config(&config()).unwrap();
        let claims = verifier
            .verify(&token("user-1", "https://idp.example.com", 600, SECRET))
            .unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn rejects_bad_signature_issuer_and_expiry() {
        let verifier = IdentityVerifier::from_config(&config()).unwrap();
        assert!(verifier
            .verify(&token("user-1", "https://idp.example.com", 600, "other"))
            .is_err());
        assert!(verifier
            .verify(&token("user-1", "https://evil.example.com", 600, SECRET))
            .is_err());
        assert!(verifier
            .verify(&token("user-1", "https://idp.example.com", -3600, SECRET))
            .is_err());
        assert!(verifier
            .verify(&token("", "https://idp.example.com", 600, SECRET))
            .is_err());
        assert!(verifier.verify("not-a-jwt").is_err());
    }

    #[test]
    fn needs_a_key() {
        let mut c = config();
        c.jwt_secret = None;
        assert!(IdentityVerifier::from_config(&c).is_err());
    }
}
