//! Services layer for totp-service.
//!
//! Business logic for owner secret management and public share
//! redemption, over a pluggable [`SecretStore`].

pub mod cipher;
mod database;
pub mod error;
pub mod secrets;
pub mod share;
pub mod store;

pub use cipher::SecretCipher;
pub use database::Database;
pub use error::ServiceError;
pub use secrets::{CurrentCode, NewSecret, SecretPatch, SecretService, SecretSource, SecretView};
pub use share::{
    CreateGrantRequest, CreatedGrant, DenialReason, GrantSummary, RedemptionOutcome,
    ShareService, ShareSettings, SharedSecret,
};
pub use store::{InMemoryStore, SecretStore};
