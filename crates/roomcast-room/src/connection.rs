//! Per-connection reader and writer pumps.
//!
//! Each attached connection runs two tasks that only share the transport
//! and the open/closed state of its outbound queue:
//!
//! - the **reader** decodes inbound frames, stamps and persists them, and
//!   hands them to the room for fan-out;
//! - the **writer** drains the outbound queue to the transport.
//!
//! Whichever side stops first brings the other one down. When the reader
//! exits it closes the transport and sends exactly one Leave, which makes
//! the room drop the queue's sender and so ends the writer. When the writer
//! exits it closes the transport, which ends the reader's `recv`.

use std::sync::Arc;

use roomcast_protocol::{Codec, InboundMessage, Message, ParticipantId};
use roomcast_store::MessageStore;
use roomcast_transport::{Connection, ConnectionId};
use tokio::task::JoinHandle;

use crate::queue::{Frame, OutboundReceiver};
use crate::room::{Delivery, WeakRoomHandle};

/// The two tasks serving one attached connection.
#[derive(Debug)]
pub struct ConnectionTasks {
    pub conn_id: ConnectionId,
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

impl ConnectionTasks {
    /// Waits until both pumps have stopped.
    pub async fn join(self) {
        let _ = self.reader.await;
        let _ = self.writer.await;
    }
}

/// Sends the Leave for a connection when its reader stops, however it
/// stops (clean close, read error, or the task being aborted).
struct LeaveGuard<C: Connection> {
    conn: Arc<C>,
    room: WeakRoomHandle,
}

impl<C: Connection> Drop for LeaveGuard<C> {
    fn drop(&mut self) {
        let conn = Arc::clone(&self.conn);
        let room = self.room.clone();

        // Dropped outside a runtime (e.g. at process teardown) there is
        // nobody left to notify.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        runtime.spawn(async move {
            let conn_id = conn.id();
            if let Err(e) = conn.close().await {
                tracing::debug!(
                    %conn_id,
                    error = %e,
                    "close after read failed"
                );
            }
            if let Some(room) = room.upgrade() {
                if let Err(e) = room.leave(conn_id).await {
                    tracing::debug!(%conn_id, error = %e, "leave not delivered");
                }
            }
        });
    }
}

/// Everything the reader needs besides the transport.
pub(crate) struct ReadContext<S, K> {
    pub participant: ParticipantId,
    pub room: WeakRoomHandle,
    pub store: Arc<S>,
    pub codec: Arc<K>,
}

/// Spawns both pumps for an already-joined connection.
pub(crate) fn spawn_pumps<C, S, K>(
    conn: Arc<C>,
    outbound: OutboundReceiver,
    ctx: ReadContext<S, K>,
) -> ConnectionTasks
where
    C: Connection,
    S: MessageStore,
    K: Codec,
{
    let conn_id = conn.id();
    let writer = tokio::spawn(write_pump(Arc::clone(&conn), outbound));
    let reader = tokio::spawn(read_pump(conn, ctx));
    ConnectionTasks {
        conn_id,
        reader,
        writer,
    }
}

async fn read_pump<C, S, K>(conn: Arc<C>, ctx: ReadContext<S, K>)
where
    C: Connection,
    S: MessageStore,
    K: Codec,
{
    let conn_id = conn.id();
    let _guard = LeaveGuard {
        conn: Arc::clone(&conn),
        room: ctx.room.clone(),
    };

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(
                    %conn_id,
                    participant = %ctx.participant,
                    "connection closed"
                );
                break;
            }
            Err(e) => {
                tracing::debug!(
                    %conn_id,
                    participant = %ctx.participant,
                    error = %e,
                    "read failed"
                );
                break;
            }
        };

        let inbound: InboundMessage = match ctx.codec.decode(&data) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "skipping malformed frame");
                continue;
            }
        };

        let message = Message::stamp(
            inbound,
            ctx.participant.clone(),
            ctx.room.name().clone(),
        );

        if let Err(e) = ctx.store.append(&message).await {
            tracing::warn!(
                room = %message.room,
                sender = %message.sender,
                error = %e,
                "failed to persist message, not delivering"
            );
            continue;
        }

        let frame: Frame = match ctx.codec.encode(&message) {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to encode message");
                continue;
            }
        };

        let Some(room) = ctx.room.upgrade() else {
            tracing::debug!(%conn_id, room = %ctx.room.name(), "room gone");
            break;
        };
        let delivery = Delivery {
            recipient: message.recipient,
            frame,
        };
        if room.deliver(delivery).await.is_err() {
            break;
        }
    }
}

async fn write_pump<C: Connection>(
    conn: Arc<C>,
    mut outbound: OutboundReceiver,
) {
    let conn_id = conn.id();

    while let Some(frame) = outbound.next().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(%conn_id, error = %e, "write failed");
            break;
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close after write failed");
    }
}
