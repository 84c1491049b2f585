//! Rooms, fan-out, and connection pumps for roomcast.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! member set. Connections are served by a reader/writer task pair that
//! talk to their room only through its command channel and their own
//! outbound queue.
//!
//! # Key types
//!
//! - [`Hub`] — registry of rooms, attach/detach, history
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`OutboundSender`] / [`OutboundReceiver`] — the bounded per-connection
//!   queue with its `best-effort-delivery` policy
//! - [`HubConfig`] — queue and channel sizes

mod config;
mod connection;
mod error;
mod hub;
mod queue;
mod room;

pub use config::{
    DEFAULT_COMMAND_CHANNEL_SIZE, DEFAULT_OUTBOUND_CAPACITY, HubConfig,
};
pub use connection::ConnectionTasks;
pub use error::RoomError;
pub use hub::{Hub, JoinMode};
pub use queue::{
    Frame, Offer, OutboundReceiver, OutboundSender, outbound_queue,
};
pub use room::{Delivery, RoomHandle, RoomInfo, WeakRoomHandle};
