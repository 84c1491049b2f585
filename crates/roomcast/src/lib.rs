//! # roomcast
//!
//! Room-based message broadcast hub.
//!
//! Clients open a WebSocket to a named room and every JSON message one of
//! them sends is stamped, persisted, and fanned out to the room's members
//! (or to one addressed member). Slow clients lose messages instead of
//! slowing their room down.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomcast::prelude::*;
//!
//! # async fn run() -> Result<(), RoomcastError> {
//! let server = RoomcastServerBuilder::new()
//!     .bind("127.0.0.1:8000")
//!     .build(MemoryStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! Clients connect to `/create?room=<name>&id=<participant>` to create a
//! room and join it, or `/ws?room=<name>&id=<participant>` to join a room
//! that already exists.

mod error;
mod handler;
mod server;

pub use error::RoomcastError;
pub use handler::{CREATE_PATH, JOIN_PATH};
pub use server::{
    DEFAULT_BIND_ADDR, HANDSHAKE_TIMEOUT, RoomcastServer, RoomcastServerBuilder,
};

pub use roomcast_protocol as protocol;
pub use roomcast_room as room;
pub use roomcast_store as store;
pub use roomcast_transport as transport;

pub mod prelude {
    pub use crate::{RoomcastError, RoomcastServer, RoomcastServerBuilder};
    pub use roomcast_protocol::{
        Codec, JsonCodec, Message, MessageKind, ParticipantId, Recipient,
        Rejection, RoomName,
    };
    pub use roomcast_room::{
        Hub, HubConfig, JoinMode, RoomError, RoomHandle, RoomInfo,
    };
    pub use roomcast_store::{MemoryStore, MessageStore, StoreError};
    pub use roomcast_transport::{Connection, ConnectionId, TransportError};
}
