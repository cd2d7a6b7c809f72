//! # signalhub-api
//!
//! HTTP layer for SignalHub built on Axum.
//!
//! Provides the WebSocket upgrade endpoint, health and stats endpoints, the
//! server-side broadcast endpoint, the bearer-token extractor, error
//! mapping, and server bootstrap.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, run_server};
pub use error::ApiError;
pub use state::AppState;
