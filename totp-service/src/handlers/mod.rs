//! HTTP handlers for totp-service.

pub mod metrics;
pub mod redeem;
pub mod secrets;
pub mod shares;
pub mod totp;

pub use redeem::*;
pub use secrets::*;
pub use shares::*;
pub use totp::*;
