//! Wire protocol: message types, the outbound envelope, and inbound decoding.

pub mod codec;
pub mod envelope;
pub mod types;

pub use codec::{ErrorCode, InboundFrame, ProtocolError, decode_client, validate_channel_name};
pub use envelope::Envelope;
pub use types::{ClientMessage, ServerMessage};
