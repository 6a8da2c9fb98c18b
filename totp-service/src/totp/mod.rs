//! TOTP engine (RFC 6238 over RFC 4226 HOTP, HMAC-SHA1) and
//! `otpauth://` provisioning URIs.
//!
//! The engine is a plain value: all parameters live in [`TotpSettings`]
//! and nothing here touches global state, so a single engine can be shared
//! freely across request handlers.

mod engine;
mod provisioning;

pub use engine::{normalize_secret, TotpEngine, TotpSettings};
pub use provisioning::{build_provisioning_uri, parse_provisioning_uri, ProvisioningUri};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TotpError {
    #[error("Invalid secret format")]
    InvalidSecretFormat,

    #[error("Malformed provisioning URI: {0}")]
    MalformedUri(String),
}
