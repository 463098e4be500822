//! Credential lifecycles: LWA bearer tokens and AWS request signing.

pub mod lwa;
pub mod secret;
pub mod sigv4;

pub use lwa::*;
pub use secret::*;
pub use sigv4::*;
