//! Unified error type for roomcast.

use roomcast_protocol::ProtocolError;
use roomcast_room::RoomError;
use roomcast_store::StoreError;
use roomcast_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `roomcast` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum RoomcastError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A storage error outside any room operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A room-level error (not found, duplicate identity, bad request).
    #[error(transparent)]
    Room(#[from] RoomError),
}
