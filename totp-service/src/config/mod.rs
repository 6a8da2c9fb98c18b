use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct TotpServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub encryption: EncryptionConfig,
    pub identity: IdentityConfig,
    pub share: ShareConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncryptionConfig {
    /// Base64 of the 32-byte AES-256-GCM key sealing stored secrets.
    pub secret_key: Secret<String>,
}

/// How bearer tokens from the identity provider are verified.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Shared HS256 secret.
    pub jwt_secret: Option<Secret<String>>,
    /// RS256 public key (PEM). Takes precedence over `jwt_secret`.
    pub jwt_public_key_path: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    pub public_base_url: String,
    pub default_expiration_hours: u32,
    pub max_expiration_hours: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    pub redeem_attempts: u32,
    pub redeem_window_seconds: u64,
}

/// Upper bound for `SHARE_MAX_EXPIRATION_HOURS` (ten years).
pub const MAX_SHARE_EXPIRATION_HOURS: u32 = 87_600;

impl TotpServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = TotpServiceConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("totp-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: Secret::new(get_env(
                    "DATABASE_URL",
                    Some("postgres://localhost/totp_vault"),
                    is_prod,
                )?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?,
            },
            encryption: EncryptionConfig {
                secret_key: Secret::new(get_env("SECRET_ENCRYPTION_KEY", None, is_prod)?),
            },
            identity: IdentityConfig {
                jwt_secret: optional_env("IDP_JWT_SECRET").map(Secret::new),
                jwt_public_key_path: optional_env("IDP_JWT_PUBLIC_KEY_PATH"),
                issuer: optional_env("IDP_ISSUER"),
                audience: optional_env("IDP_AUDIENCE"),
            },
            share: ShareConfig {
                public_base_url: get_env(
                    "PUBLIC_BASE_URL",
                    Some("http://localhost:3000"),
                    is_prod,
                )?,
                default_expiration_hours: parse_env(
                    "SHARE_DEFAULT_EXPIRATION_HOURS",
                    Some("24"),
                    is_prod,
                )?,
                max_expiration_hours: parse_env(
                    "SHARE_MAX_EXPIRATION_HOURS",
                    Some("720"),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", Some("100"), is_prod)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                redeem_attempts: parse_env("RATE_LIMIT_REDEEM_ATTEMPTS", Some("10"), is_prod)?,
                redeem_window_seconds: parse_env(
                    "RATE_LIMIT_REDEEM_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.share.default_expiration_hours == 0 || self.share.max_expiration_hours == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Share expiration hours must be positive"
            )));
        }

        if self.share.max_expiration_hours > MAX_SHARE_EXPIRATION_HOURS {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SHARE_MAX_EXPIRATION_HOURS must be at most {}",
                MAX_SHARE_EXPIRATION_HOURS
            )));
        }

        if self.share.default_expiration_hours > self.share.max_expiration_hours {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SHARE_DEFAULT_EXPIRATION_HOURS exceeds SHARE_MAX_EXPIRATION_HOURS"
            )));
        }

        let key_len = base64_decoded_len(self.encryption.secret_key.expose_secret());
        if key_len != Some(32) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SECRET_ENCRYPTION_KEY must be base64 of exactly 32 bytes"
            )));
        }

        if self.identity.jwt_secret.is_none() && self.identity.jwt_public_key_path.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "One of IDP_JWT_SECRET or IDP_JWT_PUBLIC_KEY_PATH must be set"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if !self.share.public_base_url.starts_with("https://") {
                tracing::warn!("PUBLIC_BASE_URL is not https; share links will leak over plain HTTP");
            }
        }

        Ok(())
    }
}

fn base64_decoded_len(value: &str) -> Option<usize> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    STANDARD.decode(value.trim()).ok().map(|bytes| bytes.len())
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TotpServiceConfig {
        TotpServiceConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "totp-service".to_string(),
            service_version: "0.0.0".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: Secret::new("postgres://localhost/test".to_string()),
                max_connections: 5,
                min_connections: 1,
            },
            encryption: EncryptionConfig {
                secret_key: Secret::new("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string()),
            },
            identity: IdentityConfig {
                jwt_secret: Some(Secret::new("test-secret".to_string())),
                jwt_public_key_path: None,
                issuer: None,
                audience: None,
            },
            share: ShareConfig {
                public_base_url: "https://vault.example.com".to_string(),
                default_expiration_hours: 24,
                max_expiration_hours: 720,
            },
            security: SecurityConfig {
                allowed_origins: vec!["https://vault.example.com".to_string()],
            },
            rate_limit: RateLimitConfig {
                global_ip_limit: 100,
                global_ip_window_seconds: 60,
                redeem_attempts: 10,
                redeem_window_seconds: 60,
            },
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_bad_expiration_bounds() {
        let mut c = config();
        c.share.default_expiration_hours = 0;
        assert!(c.validate().is_err());

        let mut c = config();
        c.share.default_expiration_hours = 1000;
        assert!(c.validate().is_err());
    }

    #[test]
    fn caps_max_expiration_hours() {
        let mut c = config();
        c.share.max_expiration_hours = MAX_SHARE_EXPIRATION_HOURS;
        assert!(c.validate().is_ok());

        c.share.max_expiration_hours = 4_000_000_000;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_wrong_key_length() {
        let mut c = config();
        c.encryption.secret_key = Secret::new("AAAA".to_string());
        assert!(c.validate().is_err());
    }

    #[test]
    fn requires_an_identity_key() {
        let mut c = config();
        c.identity.jwt_secret = None;
        assert!(c.validate().is_err());

        c.identity.jwt_public_key_path = Some("/etc/idp/public.pem".to_string());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn wildcard_cors_only_rejected_in_prod() {
        let mut c = config();
        c.security.allowed_origins = vec!["*".to_string()];
        assert!(c.validate().is_ok());

        c.environment = Environment::Prod;
        assert!(c.validate().is_err());
    }

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert!("staging".parse::<Environment>().is_err());
    }
}
