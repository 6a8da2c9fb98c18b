use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::totp::ProvisioningUri;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateSecretQuery {
    #[validate(length(min = 1, max = 100, message = "Account name must be 1-100 characters"))]
    pub account_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Issuer must be 1-100 characters"))]
    pub issuer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateSecretResponse {
    pub secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_uri: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ParseUriRequest {
    #[validate(length(min = 1, max = 2048, message = "URI must be 1-2048 characters"))]
    pub uri: String,
}

#[derive(Debug, Serialize)]
pub struct ParseUriResponse {
    pub secret: String,
    pub account_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl From<ProvisioningUri> for ParseUriResponse {
    fn from(parsed: ProvisioningUri) -> Self {
        Self {
            secret: parsed.secret,
            account_name: parsed.account_name,
            issuer: parsed.issuer,
        }
    }
}
