//! # signalhub-database
//!
//! PostgreSQL connection management and the read-only repositories the
//! gateway consumes: identity lookup, aggregate usage metrics and the recent
//! event log.

pub mod connection;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{EventRepository, MetricsRepository, UserRepository};
