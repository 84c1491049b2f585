//! In-memory [`MessageStore`].

use std::collections::{BTreeSet, HashMap};

use roomcast_protocol::{Message, MessageKind, ParticipantId, RoomName};
use tokio::sync::RwLock;

use crate::{MessageStore, StoreError};

#[derive(Default)]
struct Inner {
    messages: Vec<Message>,
    rooms: Vec<RoomName>,
    members: HashMap<RoomName, BTreeSet<ParticipantId>>,
}

/// Keeps everything in process memory; contents are lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages appended so far, across all rooms.
    pub async fn message_count(&self) -> usize {
        self.inner.read().await.messages.len()
    }
}

impl MessageStore for MemoryStore {
    async fn append(&self, message: &Message) -> Result<(), StoreError> {
        self.inner.write().await.messages.push(message.clone());
        Ok(())
    }

    async fn list_by_room(
        &self,
        room: &RoomName,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| &m.room == room)
            .cloned()
            .collect())
    }

    async fn list_by_room_and_kind(
        &self,
        room: &RoomName,
        kind: &MessageKind,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| &m.room == room && &m.kind == kind)
            .cloned()
            .collect())
    }

    async fn create_room_record(
        &self,
        room: &RoomName,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.rooms.contains(room) {
            inner.rooms.push(room.clone());
            tracing::debug!(%room, "room record created");
        }
        Ok(())
    }

    async fn list_room_names(&self) -> Result<Vec<RoomName>, StoreError> {
        Ok(self.inner.read().await.rooms.clone())
    }

    async fn add_membership(
        &self,
        room: &RoomName,
        participant: &ParticipantId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .members
            .entry(room.clone())
            .or_default()
            .insert(participant.clone()))
    }

    async fn delete_membership(
        &self,
        room: &RoomName,
        participant: &ParticipantId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .members
            .get_mut(room)
            .is_some_and(|set| set.remove(participant)))
    }

    async fn list_members(
        &self,
        room: &RoomName,
    ) -> Result<Vec<ParticipantId>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .members
            .get(room)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}
