//! The hub: registry of rooms and the control surface around it.

use std::collections::HashMap;
use std::sync::Arc;

use roomcast_protocol::{
    Codec, InboundMessage, JsonCodec, Message, MessageKind, ParticipantId,
    RoomName,
};
use roomcast_store::MessageStore;
use roomcast_transport::Connection;
use tokio::sync::Mutex;

use crate::connection::{spawn_pumps, ConnectionTasks, ReadContext};
use crate::queue::outbound_queue;
use crate::room::spawn_room;
use crate::{HubConfig, RoomError, RoomHandle};

/// How [`Hub::attach`] resolves the room it attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Participant join: the room must already exist.
    Existing,
    /// Create-then-join: the room is created if it is not registered yet.
    Create,
}

/// Process-wide registry of rooms, keyed by name.
///
/// Built once at startup and shared behind an `Arc` by everything that
/// needs room lookup. Rooms are registered on first use and live until
/// the hub is dropped.
pub struct Hub<S: MessageStore, K: Codec = JsonCodec> {
    rooms: Mutex<HashMap<RoomName, RoomHandle>>,
    /// Held while a pair room is checked and recorded.
    pairing: Mutex<()>,
    store: Arc<S>,
    codec: Arc<K>,
    config: HubConfig,
}

impl<S: MessageStore> Hub<S, JsonCodec> {
    /// Creates a hub that speaks JSON.
    pub fn new(store: S, config: HubConfig) -> Self {
        Self::with_codec(store, JsonCodec, config)
    }
}

impl<S: MessageStore, K: Codec> Hub<S, K> {
    pub fn with_codec(store: S, codec: K, config: HubConfig) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            pairing: Mutex::new(()),
            store: Arc::new(store),
            codec: Arc::new(codec),
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The codec every connection of this hub speaks.
    pub fn codec(&self) -> &K {
        &self.codec
    }

    /// Returns the room registered under `name`, creating and starting it
    /// first if there is none.
    ///
    /// Lookup and insert happen under one lock, so callers racing on an
    /// unseen name all get the same room.
    pub async fn get_or_create(&self, name: &RoomName) -> RoomHandle {
        let handle = {
            let mut rooms = self.rooms.lock().await;
            if let Some(handle) = rooms.get(name) {
                return handle.clone();
            }
            let handle = spawn_room(
                name.clone(),
                Arc::clone(&self.store),
                self.config.command_channel_size,
            );
            rooms.insert(name.clone(), handle.clone());
            handle
        };

        if let Err(e) = self.store.create_room_record(name).await {
            tracing::warn!(room = %name, error = %e, "failed to record room");
        }
        handle
    }

    /// Looks a room up without creating it.
    pub async fn get(&self, name: &RoomName) -> Result<RoomHandle, RoomError> {
        self.rooms
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(name.clone()))
    }

    /// Number of rooms currently registered.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Joins `conn` to `room` as `participant`, records the membership,
    /// and starts its pumps.
    ///
    /// With [`JoinMode::Existing`] an unknown room fails with
    /// [`RoomError::NotFound`]. A participant already live in the room
    /// fails with [`RoomError::DuplicateParticipant`]. On failure nothing
    /// is spawned and the caller still owns the connection.
    pub async fn attach<C: Connection>(
        &self,
        room: &RoomName,
        participant: ParticipantId,
        conn: Arc<C>,
        mode: JoinMode,
    ) -> Result<ConnectionTasks, RoomError> {
        let handle = match mode {
            JoinMode::Existing => self.get(room).await?,
            JoinMode::Create => self.get_or_create(room).await,
        };

        let (outbound_tx, outbound_rx) =
            outbound_queue(self.config.outbound_capacity);
        handle
            .join(conn.id(), participant.clone(), outbound_tx)
            .await?;

        let ctx = ReadContext {
            participant,
            room: handle.downgrade(),
            store: Arc::clone(&self.store),
            codec: Arc::clone(&self.codec),
        };
        Ok(spawn_pumps(conn, outbound_rx, ctx))
    }

    /// Removes every live connection of `participant` from `room`.
    ///
    /// Each removal is a regular Leave: the connection's queue is closed
    /// (which shuts its transport down) and the membership record is
    /// deleted. Returns how many connections were removed.
    pub async fn detach_member(
        &self,
        room: &RoomName,
        participant: &ParticipantId,
    ) -> Result<usize, RoomError> {
        let handle = self.get(room).await?;
        let removed = handle.detach(participant.clone()).await?;
        if removed == 0 {
            return Err(RoomError::MemberNotFound(
                participant.clone(),
                room.clone(),
            ));
        }
        tracing::info!(%room, %participant, removed, "participant detached");
        Ok(removed)
    }

    /// Creates a private room for two participants and records both as
    /// members, without attaching any connection.
    ///
    /// Refused with [`RoomError::AlreadyPaired`] when the two identities
    /// already share a recorded room, and with
    /// [`RoomError::InvalidRequest`] when both identities are the same.
    /// Either participant can then attach with [`JoinMode::Existing`].
    pub async fn create_pair_room(
        &self,
        room: &RoomName,
        first: ParticipantId,
        second: ParticipantId,
    ) -> Result<RoomHandle, RoomError> {
        if first == second {
            return Err(RoomError::InvalidRequest(format!(
                "pair room needs two participants, got {first} twice"
            )));
        }

        let _pairing = self.pairing.lock().await;
        if let Some(shared) =
            self.shared_rooms(&first, &second).await?.into_iter().next()
        {
            return Err(RoomError::AlreadyPaired(first, second, shared));
        }

        let handle = self.get_or_create(room).await;
        handle.record_member(first.clone()).await?;
        handle.record_member(second.clone()).await?;
        tracing::info!(%room, %first, %second, "pair room created");
        Ok(handle)
    }

    /// Recorded rooms whose membership includes both identities.
    pub async fn shared_rooms(
        &self,
        first: &ParticipantId,
        second: &ParticipantId,
    ) -> Result<Vec<RoomName>, RoomError> {
        let mut shared = Vec::new();
        for room in self.store.list_room_names().await? {
            let members = self.store.list_members(&room).await?;
            if members.contains(first) && members.contains(second) {
                shared.push(room);
            }
        }
        Ok(shared)
    }

    /// Stamps and stores a message for `room` without fanning it out.
    ///
    /// The room does not need to be running; nobody connected sees the
    /// message until they read the history.
    pub async fn save_message(
        &self,
        room: &RoomName,
        sender: ParticipantId,
        inbound: InboundMessage,
    ) -> Result<Message, RoomError> {
        let message = Message::stamp(inbound, sender, room.clone());
        self.store.append(&message).await?;
        tracing::debug!(%room, sender = %message.sender, "message saved");
        Ok(message)
    }

    /// Every room name the store has a record of.
    pub async fn list_rooms(&self) -> Result<Vec<RoomName>, RoomError> {
        Ok(self.store.list_room_names().await?)
    }

    /// Recorded member identities of `room`.
    pub async fn list_members(
        &self,
        room: &RoomName,
    ) -> Result<Vec<ParticipantId>, RoomError> {
        Ok(self.store.list_members(room).await?)
    }

    /// Identities currently connected to a running room, sorted.
    pub async fn live_members(
        &self,
        room: &RoomName,
    ) -> Result<Vec<ParticipantId>, RoomError> {
        let handle = self.get(room).await?;
        Ok(handle.info().await?.members)
    }

    /// Stored messages of `room`, oldest first.
    pub async fn history(
        &self,
        room: &RoomName,
    ) -> Result<Vec<Message>, RoomError> {
        Ok(self.store.list_by_room(room).await?)
    }

    /// Stored messages of `room` with the given kind, oldest first.
    pub async fn history_by_kind(
        &self,
        room: &RoomName,
        kind: &MessageKind,
    ) -> Result<Vec<Message>, RoomError> {
        Ok(self.store.list_by_room_and_kind(room, kind).await?)
    }
}
