//! # signalhub-core
//!
//! Core crate for the SignalHub broadcast gateway. Contains the
//! configuration schema, the unified error system, the role type, and the
//! traits through which the gateway talks to its collaborators (identity
//! store, metrics source, activity log, health probe).
//!
//! This crate has **no** internal dependencies on other SignalHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
