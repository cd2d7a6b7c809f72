//! Repositories over the application database.
//!
//! Each repository implements one of the collaborator traits from
//! `signalhub_core::traits`. All of them are read-only.

pub mod event;
pub mod metrics;
pub mod user;

pub use event::EventRepository;
pub use metrics::MetricsRepository;
pub use user::UserRepository;
