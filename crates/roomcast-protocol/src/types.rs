//! Core protocol types for roomcast's wire format.
//!
//! Both directions carry the same JSON object:
//!
//! ```text
//! { "sender", "content", "roomname", "recipientid", "type", "time" }
//! ```
//!
//! Inbound frames decode into [`InboundMessage`], which is lenient about
//! missing fields. The server turns that into a [`Message`] by binding the
//! sender and room of the connection it arrived on and stamping `time`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// The recipient sentinel that addresses every member of a room.
pub const ALL_RECIPIENTS: &str = "all";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A participant identifier. Opaque, unique within a room, not globally.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Builds an identifier, rejecting empty strings.
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "participant id must not be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A room name: the key rooms are registered under in the hub.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

impl RoomName {
    /// Builds a room name, rejecting empty strings.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "room name must not be empty".into(),
            ));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-form message kind tag ("text", "image", ...), used to filter
/// history. The hub attaches no meaning to it.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageKind(String);

impl MessageKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(value: ParticipantId) -> Self {
        value.0
    }
}

impl TryFrom<String> for RoomName {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoomName> for String {
    fn from(value: RoomName) -> Self {
        value.0
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who a message is addressed to.
///
/// On the wire this is a plain string: `"all"` or a participant id. An
/// empty string is read as `"all"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Recipient {
    /// Every member of the room, the sender included.
    #[default]
    All,

    /// Only the members whose identity equals this one.
    Participant(ParticipantId),
}

impl Recipient {
    /// Returns `true` if a member with identity `id` should receive the
    /// message.
    pub fn includes(&self, id: &ParticipantId) -> bool {
        match self {
            Self::All => true,
            Self::Participant(target) => target == id,
        }
    }
}

impl From<String> for Recipient {
    fn from(value: String) -> Self {
        if value.is_empty() || value == ALL_RECIPIENTS {
            Self::All
        } else {
            Self::Participant(ParticipantId(value))
        }
    }
}

impl From<Recipient> for String {
    fn from(value: Recipient) -> Self {
        match value {
            Recipient::All => ALL_RECIPIENTS.to_string(),
            Recipient::Participant(id) => id.0,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_RECIPIENTS),
            Self::Participant(id) => f.write_str(id.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A frame as a client sent it. Every field is optional on the wire.
///
/// `sender`, `roomname` and `time` are read but never trusted: the server
/// overwrites them when building the [`Message`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InboundMessage {
    pub sender: String,
    pub content: String,
    #[serde(rename = "roomname")]
    pub room: String,
    #[serde(rename = "recipientid")]
    pub recipient: Recipient,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub time: Option<String>,
}

/// A message as the server delivers and stores it.
///
/// Immutable once built; fan-out shares one encoded copy between members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: ParticipantId,
    pub content: String,
    #[serde(rename = "roomname")]
    pub room: RoomName,
    #[serde(rename = "recipientid")]
    pub recipient: Recipient,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub time: String,
}

impl Message {
    /// Builds the delivered form of an inbound frame, stamped with the
    /// current server time.
    pub fn stamp(
        inbound: InboundMessage,
        sender: ParticipantId,
        room: RoomName,
    ) -> Self {
        Self::stamp_at(inbound, sender, room, Utc::now())
    }

    /// Like [`stamp`](Self::stamp) with an explicit receipt instant.
    pub fn stamp_at(
        inbound: InboundMessage,
        sender: ParticipantId,
        room: RoomName,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sender,
            content: inbound.content,
            room,
            recipient: inbound.recipient,
            kind: inbound.kind,
            time: server_timestamp(received_at),
        }
    }
}

/// Server timestamp layout: `DD-MM-YYYYTHH:MM:SS.mmmAM+HH:MM`, 12-hour
/// clock with an AM/PM marker.
///
/// The date and clock part is what existing clients parse. The trailing
/// `+HH:MM` is the real UTC offset of `at` (always `+00:00`), not a
/// fixed suffix.
pub fn server_timestamp(at: DateTime<Utc>) -> String {
    at.format("%d-%m-%YT%I:%M:%S%.3f%p%:z").to_string()
}

/// Sent to a client whose attach request was rejected, right before the
/// connection is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// HTTP-style status: 400 bad request, 404 not found, 409 conflict,
    /// 500 server-side failure.
    pub code: u16,
    pub error: String,
}
