//! # signalhub-auth
//!
//! Bearer token handling for the SignalHub gateway.
//!
//! - `jwt::claims`: the claims carried by application tokens
//! - `jwt::decoder`: signature and expiry verification
//! - `jwt::encoder`: token issuance (CLI and tests)

pub mod jwt;

pub use jwt::{Claims, IssuedToken, JwtDecoder, JwtEncoder};
