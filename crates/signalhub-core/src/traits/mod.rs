//! Interfaces to the systems the gateway consumes but does not own.
//!
//! The Postgres-backed implementations live in `signalhub-database`; tests
//! substitute in-memory fakes.

pub mod activity;
pub mod health;
pub mod identity;
pub mod metrics;

pub use activity::{ActivityRecord, ActivitySource};
pub use health::HealthProbe;
pub use identity::IdentityStore;
pub use metrics::{MetricsSource, UsageMetrics};
