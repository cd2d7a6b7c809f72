//! HTTP and WebSocket handlers.

pub mod broadcast;
pub mod health;
pub mod ws;
