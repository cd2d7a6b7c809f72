//! Per-connection state and admission.

pub mod authenticator;
pub mod handle;

pub use authenticator::WsAuthenticator;
pub use handle::{CloseCode, ConnectionHandle, ConnectionId, Frame};
