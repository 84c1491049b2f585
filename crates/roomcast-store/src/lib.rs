//! Message store contract for roomcast.
//!
//! The hub persists every delivered message and keeps companion metadata
//! (known room names, room membership) through the [`MessageStore`] trait.
//! It never sees a storage engine directly, and everything crossing the
//! trait is strongly typed: a backend that finds a malformed record
//! reports [`StoreError::Corrupt`] instead of handing it upward.
//!
//! [`MemoryStore`] is the process-local implementation used by the demo
//! server and the test suites.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use std::future::Future;

use roomcast_protocol::{Message, MessageKind, ParticipantId, RoomName};

/// Durable append-only message log plus room/membership metadata.
///
/// Returned futures are `Send` so the hub can call the store from
/// spawned tasks.
pub trait MessageStore: Send + Sync + 'static {
    /// Appends a delivered message to the log.
    fn append(
        &self,
        message: &Message,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every stored message for `room`, oldest first.
    fn list_by_room(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Stored messages for `room` with the given kind tag, oldest first.
    fn list_by_room_and_kind(
        &self,
        room: &RoomName,
        kind: &MessageKind,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Records that a room exists. Recording a known room again is a no-op.
    fn create_room_record(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every recorded room name, in creation order.
    fn list_room_names(
        &self,
    ) -> impl Future<Output = Result<Vec<RoomName>, StoreError>> + Send;

    /// Records that `participant` is a member of `room`.
    ///
    /// Returns `false` if the pair was already recorded; memberships are
    /// unique per `(room, participant)`.
    fn add_membership(
        &self,
        room: &RoomName,
        participant: &ParticipantId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Removes the membership record. Returns `false` if there was none.
    fn delete_membership(
        &self,
        room: &RoomName,
        participant: &ParticipantId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Recorded member identities of `room`.
    fn list_members(
        &self,
        room: &RoomName,
    ) -> impl Future<Output = Result<Vec<ParticipantId>, StoreError>> + Send;
}
