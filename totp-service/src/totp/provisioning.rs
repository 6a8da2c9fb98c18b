//! `otpauth://totp/` key URIs as consumed by authenticator apps.
//!
//! Format: `otpauth://totp/<account>?secret=<base32>&issuer=<issuer>`

use url::Url;

use super::engine::{decode_secret, normalize_secret};
use super::TotpError;

/// The parts of a provisioning URI this service cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningUri {
    pub secret: String,
    pub account_name: String,
    pub issuer: Option<String>,
}

/// Format a secret as a key URI for QR provisioning.
pub fn build_provisioning_uri(secret: &str, account_name: &str, issuer: &str) -> String {
    format!(
        "otpauth://totp/{}?secret={}&issuer={}",
        urlencoding::encode(account_name),
        normalize_secret(secret),
        urlencoding::encode(issuer)
    )
}

/// Extract secret, account name and issuer from a key URI.
///
/// The label may carry an `Issuer:` prefix; the `issuer` query parameter
/// wins when both are present. An empty issuer is reported as `None`.
/// URIs asking for parameters the engine does not implement (non-SHA1,
/// other digit counts or periods) are rejected rather than silently
/// producing codes that would never match.
pub fn parse_provisioning_uri(uri: &str) -> Result<ProvisioningUri, TotpError> {
    let url = Url::parse(uri.trim())
        .map_err(|e| TotpError::MalformedUri(format!("not a valid URI: {}", e)))?;

    if url.scheme() != "otpauth" {
        return Err(TotpError::MalformedUri(format!(
            "expected scheme 'otpauth', got '{}'",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if host.eq_ignore_ascii_case("totp") => {}
        Some(host) => {
            return Err(TotpError::MalformedUri(format!(
                "unsupported OTP type '{}'",
                host
            )))
        }
        None => return Err(TotpError::MalformedUri("missing OTP type".to_string())),
    }

    let label = urlencoding::decode(raw_label(uri.trim()))
        .map_err(|_| TotpError::MalformedUri("label is not valid UTF-8".to_string()))?;

    let (label_issuer, account_name) = match label.split_once(':') {
        Some((issuer, account)) => (Some(issuer.trim().to_string()), account.trim().to_string()),
        None => (None, label.trim().to_string()),
    };

    let mut secret = None;
    let mut query_issuer = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "secret" => secret = Some(value.into_owned()),
            "issuer" => query_issuer = Some(value.into_owned()),
            "algorithm" if !value.eq_ignore_ascii_case("SHA1") => {
                return Err(TotpError::MalformedUri(format!(
                    "unsupported algorithm '{}'",
                    value
                )))
            }
            "digits" if value != "6" => {
                return Err(TotpError::MalformedUri(format!(
                    "unsupported digit count '{}'",
                    value
                )))
            }
            "period" if value != "30" => {
                return Err(TotpError::MalformedUri(format!(
                    "unsupported period '{}'",
                    value
                )))
            }
            _ => {}
        }
    }

    let secret = secret
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| TotpError::MalformedUri("missing 'secret' parameter".to_string()))?;
    decode_secret(&secret)?;

    let issuer = query_issuer
        .or(label_issuer)
        .filter(|issuer| !issuer.is_empty());

    Ok(ProvisioningUri {
        secret: normalize_secret(&secret),
        account_name,
        issuer,
    })
}

/// Label text exactly as written in the URI. `Url::path` collapses `.`
/// and `..` segments, which are legal account names.
fn raw_label(uri: &str) -> &str {
    let without_query = uri.split(['?', '#']).next().unwrap_or(uri);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    after_scheme.split_once('/').map_or("", |(_, label)| label)
}
