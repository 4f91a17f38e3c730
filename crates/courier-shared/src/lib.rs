//! # courier-shared
//!
//! Types shared between the relay server and the message store: user and
//! message identifiers, the persisted [`MessageRecord`](protocol::MessageRecord),
//! and the JSON wire protocol spoken over the WebSocket.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use protocol::{ClientEvent, MessageRecord, ServerEvent};
pub use types::{ConnectionId, MessageId, UserId};
