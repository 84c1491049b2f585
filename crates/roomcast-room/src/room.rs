//! Room actor: one Tokio task per room that owns the member set.
//!
//! The control loop is the only code that ever touches a room's members.
//! Joins, leaves, and deliveries all arrive on one channel and are handled
//! one at a time in arrival order, so fan-out can never observe a
//! half-updated member set and needs no lock.
//!
//! Membership records are written by a second task per room, fed by the
//! control loop in the order joins and leaves were handled. A slow store
//! never stalls fan-out, and a leave's delete can't land after the add of
//! a rejoin that followed it.

use std::collections::BTreeMap;
use std::sync::Arc;

use roomcast_protocol::{ParticipantId, Recipient, RoomName};
use roomcast_store::{MessageStore, StoreError};
use roomcast_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::queue::{Frame, Offer, OutboundSender};
use crate::RoomError;

/// A message ready for fan-out: who gets it and its encoded bytes.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipient: Recipient,
    pub frame: Frame,
}

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in some variants is the reply channel.
enum RoomCommand {
    Join {
        conn_id: ConnectionId,
        participant: ParticipantId,
        outbound: OutboundSender,
        reply: oneshot::Sender<Result<Recorded, RoomError>>,
    },
    Leave {
        conn_id: ConnectionId,
        reply: oneshot::Sender<bool>,
    },
    Detach {
        participant: ParticipantId,
        reply: oneshot::Sender<usize>,
    },
    Deliver(Delivery),
    Record {
        participant: ParticipantId,
        reply: oneshot::Sender<Recorded>,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
}

/// Resolves once the membership writer has stored an add.
type Recorded = oneshot::Receiver<Result<bool, StoreError>>;

/// A membership record change, queued for the room's writer task.
enum MembershipWrite {
    Add {
        participant: ParticipantId,
        done: oneshot::Sender<Result<bool, StoreError>>,
    },
    Remove {
        participant: ParticipantId,
    },
}

/// A snapshot of a room's live membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub name: RoomName,
    /// Identities of the connections currently joined, sorted.
    pub members: Vec<ParticipantId>,
}

impl RoomInfo {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Handle to a running room actor.
///
/// Cheap to clone: it's an `mpsc::Sender` wrapper. The hub holds one per
/// room, which keeps the room alive.
#[derive(Clone)]
pub struct RoomHandle {
    name: RoomName,
    sender: mpsc::Sender<RoomCommand>,
}

/// Non-owning back-reference from a connection to its room.
///
/// Used for routing only; it never keeps a room's control loop alive.
#[derive(Clone)]
pub struct WeakRoomHandle {
    name: RoomName,
    sender: mpsc::WeakSender<RoomCommand>,
}

impl RoomHandle {
    pub fn name(&self) -> &RoomName {
        &self.name
    }

    /// Returns `true` if both handles address the same room instance.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    pub fn downgrade(&self) -> WeakRoomHandle {
        WeakRoomHandle {
            name: self.name.clone(),
            sender: self.sender.downgrade(),
        }
    }

    /// Adds a connection to the member set and returns once its membership
    /// record has been written (a failed write is logged, not returned).
    ///
    /// Fails with [`RoomError::DuplicateParticipant`] if a connection with
    /// the same identity is already joined. On failure `outbound` is
    /// dropped, which closes that queue.
    pub async fn join(
        &self,
        conn_id: ConnectionId,
        participant: ParticipantId,
        outbound: OutboundSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            conn_id,
            participant,
            outbound,
            reply: reply_tx,
        })
        .await?;
        let recorded = reply_rx.await.map_err(|_| self.unavailable())??;
        let _ = recorded.await;
        Ok(())
    }

    /// Writes a membership record for `participant` without joining a
    /// connection, in order with the room's joins and leaves.
    ///
    /// Returns `false` if the record already existed.
    pub async fn record_member(
        &self,
        participant: ParticipantId,
    ) -> Result<bool, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Record {
            participant,
            reply: reply_tx,
        })
        .await?;
        let recorded = reply_rx.await.map_err(|_| self.unavailable())?;
        Ok(recorded.await.map_err(|_| self.unavailable())??)
    }

    /// Removes a connection. Returns `false` if it wasn't a member, which
    /// is not an error.
    pub async fn leave(&self, conn_id: ConnectionId) -> Result<bool, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Leave {
            conn_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Removes every connection joined under `participant`. Returns how
    /// many were removed.
    pub async fn detach(
        &self,
        participant: ParticipantId,
    ) -> Result<usize, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::Detach {
            participant,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Queues a message for fan-out (fire-and-forget).
    pub async fn deliver(&self, delivery: Delivery) -> Result<(), RoomError> {
        self.send(RoomCommand::Deliver(delivery)).await
    }

    /// Requests a membership snapshot. Because it is sequenced through the
    /// control loop, every command sent before it has been handled by the
    /// time it returns.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RoomCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.name.clone())
    }
}

impl WeakRoomHandle {
    pub fn name(&self) -> &RoomName {
        &self.name
    }

    /// Returns a usable handle if the room is still running.
    pub fn upgrade(&self) -> Option<RoomHandle> {
        self.sender.upgrade().map(|sender| RoomHandle {
            name: self.name.clone(),
            sender,
        })
    }
}

/// One joined connection, as the actor sees it.
struct Member {
    participant: ParticipantId,
    outbound: OutboundSender,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    name: RoomName,
    members: BTreeMap<ConnectionId, Member>,
    records: mpsc::UnboundedSender<MembershipWrite>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs until every strong handle is gone.
    async fn run(mut self) {
        tracing::info!(room = %self.name, "room created");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    conn_id,
                    participant,
                    outbound,
                    reply,
                } => {
                    let result = self.handle_join(conn_id, participant, outbound);
                    let _ = reply.send(result);
                }
                RoomCommand::Leave { conn_id, reply } => {
                    let _ = reply.send(self.handle_leave(conn_id));
                }
                RoomCommand::Detach { participant, reply } => {
                    let _ = reply.send(self.handle_detach(&participant));
                }
                RoomCommand::Deliver(delivery) => {
                    self.handle_deliver(&delivery);
                }
                RoomCommand::Record { participant, reply } => {
                    let _ = reply.send(self.record(participant));
                }
                RoomCommand::GetInfo { reply } => {
                    let _ = reply.send(self.info());
                }
            }
        }

        tracing::info!(room = %self.name, "room stopped");
    }

    fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        participant: ParticipantId,
        outbound: OutboundSender,
    ) -> Result<Recorded, RoomError> {
        if self.members.values().any(|m| m.participant == participant) {
            return Err(RoomError::DuplicateParticipant(
                participant,
                self.name.clone(),
            ));
        }

        tracing::info!(
            room = %self.name,
            %participant,
            %conn_id,
            members = self.members.len() + 1,
            "participant joined"
        );
        let recorded = self.record(participant.clone());
        self.members.insert(
            conn_id,
            Member {
                participant,
                outbound,
            },
        );
        Ok(recorded)
    }

    fn handle_leave(&mut self, conn_id: ConnectionId) -> bool {
        let Some(member) = self.members.remove(&conn_id) else {
            return false;
        };

        tracing::info!(
            room = %self.name,
            participant = %member.participant,
            %conn_id,
            members = self.members.len(),
            "participant left"
        );
        let _ = self.records.send(MembershipWrite::Remove {
            participant: member.participant.clone(),
        });

        // The room holds the only sender, so this closes the queue and
        // the writer pump stops once it has drained it.
        drop(member.outbound);
        true
    }

    fn handle_detach(&mut self, participant: &ParticipantId) -> usize {
        let conn_ids: Vec<ConnectionId> = self
            .members
            .iter()
            .filter(|(_, m)| &m.participant == participant)
            .map(|(id, _)| *id)
            .collect();

        conn_ids
            .into_iter()
            .filter(|id| self.handle_leave(*id))
            .count()
    }

    fn handle_deliver(&self, delivery: &Delivery) {
        let mut enqueued = 0usize;
        let mut dropped = 0usize;

        for (conn_id, member) in &self.members {
            if !delivery.recipient.includes(&member.participant) {
                continue;
            }
            match member.outbound.offer(Arc::clone(&delivery.frame)) {
                Offer::Enqueued => enqueued += 1,
                Offer::Dropped => {
                    dropped += 1;
                    tracing::debug!(
                        room = %self.name,
                        participant = %member.participant,
                        %conn_id,
                        "outbound queue full, message dropped"
                    );
                }
                Offer::Closed => {
                    tracing::debug!(
                        room = %self.name,
                        participant = %member.participant,
                        %conn_id,
                        "writer gone, message not delivered"
                    );
                }
            }
        }

        tracing::debug!(
            room = %self.name,
            recipient = %delivery.recipient,
            enqueued,
            dropped,
            "message fanned out"
        );
    }

    fn record(&self, participant: ParticipantId) -> Recorded {
        let (done, recorded) = oneshot::channel();
        let _ = self.records.send(MembershipWrite::Add { participant, done });
        recorded
    }

    fn info(&self) -> RoomInfo {
        let mut members: Vec<ParticipantId> = self
            .members
            .values()
            .map(|m| m.participant.clone())
            .collect();
        members.sort();
        RoomInfo {
            name: self.name.clone(),
            members,
        }
    }
}

/// Applies membership writes for one room, one at a time, in the order the
/// control loop queued them. Stops when the control loop does.
async fn write_memberships<S: MessageStore>(
    room: RoomName,
    store: Arc<S>,
    mut writes: mpsc::UnboundedReceiver<MembershipWrite>,
) {
    while let Some(write) = writes.recv().await {
        match write {
            MembershipWrite::Add { participant, done } => {
                let result = store.add_membership(&room, &participant).await;
                match &result {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::debug!(
                            %room,
                            %participant,
                            "membership already recorded"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            %room,
                            %participant,
                            error = %e,
                            "failed to record membership"
                        );
                    }
                }
                let _ = done.send(result);
            }
            MembershipWrite::Remove { participant } => {
                if let Err(e) = store.delete_membership(&room, &participant).await
                {
                    tracing::warn!(
                        %room,
                        %participant,
                        error = %e,
                        "failed to delete membership record"
                    );
                }
            }
        }
    }
}

/// Spawns a new room actor task and its membership writer, and returns a
/// handle to communicate with the room.
///
/// `channel_size` bounds the control channel; senders wait when it is full.
pub(crate) fn spawn_room<S: MessageStore>(
    name: RoomName,
    store: Arc<S>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));
    let (records_tx, records_rx) = mpsc::unbounded_channel();

    let actor = RoomActor {
        name: name.clone(),
        members: BTreeMap::new(),
        records: records_tx,
        receiver: rx,
    };

    tokio::spawn(write_memberships(name.clone(), store, records_rx));
    tokio::spawn(actor.run());

    RoomHandle { name, sender: tx }
}
