//! Error types for the room layer.

use roomcast_protocol::{ParticipantId, RoomName};
use roomcast_store::StoreError;

/// Errors surfaced to callers of the hub's control surface.
///
/// Per-message failures (bad frames, a failed append) never show up here;
/// the connection pumps log them and move on.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomName),

    /// A live connection with this identity is already in the room.
    #[error("participant {0} already in room {1}")]
    DuplicateParticipant(ParticipantId, RoomName),

    /// The two identities already have membership records in a common
    /// room, so a new pair room is refused.
    #[error("participants {0} and {1} already share room {2}")]
    AlreadyPaired(ParticipantId, ParticipantId, RoomName),

    /// No live connection with this identity is in the room.
    #[error("participant {0} not in room {1}")]
    MemberNotFound(ParticipantId, RoomName),

    /// The request itself was malformed (missing room or identity, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The room's control loop is no longer reachable.
    #[error("room {0} is unavailable")]
    Unavailable(RoomName),

    /// The message store failed while serving a control request.
    #[error(transparent)]
    Store(#[from] StoreError),
}
