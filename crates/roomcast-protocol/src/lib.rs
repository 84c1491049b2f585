//! Wire protocol for roomcast.
//!
//! - **Types** ([`Message`], [`InboundMessage`], [`Recipient`], ...) — what
//!   travels over a connection and what gets stored.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from frame bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames) → Protocol (Message) → Room (fan-out)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ALL_RECIPIENTS, InboundMessage, Message, MessageKind, ParticipantId,
    Recipient, Rejection, RoomName, server_timestamp,
};
