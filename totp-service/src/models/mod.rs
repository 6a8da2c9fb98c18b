pub mod mfa_secret;
pub mod share_grant;

pub use mfa_secret::MfaSecret;
pub use share_grant::{SharePolicy, ShareGrant};
