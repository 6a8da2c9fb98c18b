pub mod secrets;
pub mod shares;
pub mod totp;

pub use secrets::*;
pub use shares::*;
pub use totp::*;
