//! Per-connection handler: route the upgrade request, attach, wait.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Parse the upgrade target (`/ws?room=..&id=..` or `/create?..`)
//!   2. Attach the connection to the room through the hub
//!   3. Wait for the reader and writer pumps to stop
//!
//! A request that can't be attached gets one error frame and is closed.

use std::sync::Arc;

use roomcast_protocol::{Codec, ParticipantId, Rejection, RoomName};
use roomcast_room::{Hub, JoinMode, RoomError};
use roomcast_store::MessageStore;
use roomcast_transport::{Connection, WebSocketConnection};

use crate::RoomcastError;

/// Upgrade path for joining a room that must already exist.
pub const JOIN_PATH: &str = "/ws";

/// Upgrade path for creating a room (if needed) and joining it.
pub const CREATE_PATH: &str = "/create";

/// What a client asked for in its upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JoinRequest {
    pub room: RoomName,
    pub participant: ParticipantId,
    pub mode: JoinMode,
}

impl JoinRequest {
    /// Parses a request target such as `/ws?room=r1&id=alice`.
    pub(crate) fn parse(target: &str) -> Result<Self, RoomError> {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));

        let mode = match path {
            JOIN_PATH => JoinMode::Existing,
            CREATE_PATH => JoinMode::Create,
            other => {
                return Err(RoomError::InvalidRequest(format!(
                    "unknown path {other}"
                )));
            }
        };

        let mut room = None;
        let mut id = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "room" => room = Some(value.into_owned()),
                "id" => id = Some(value.into_owned()),
                _ => {}
            }
        }

        let room = room
            .and_then(|r| RoomName::new(r).ok())
            .ok_or_else(|| RoomError::InvalidRequest("missing room".into()))?;
        let participant = id
            .and_then(|p| ParticipantId::new(p).ok())
            .ok_or_else(|| RoomError::InvalidRequest("missing id".into()))?;

        Ok(Self {
            room,
            participant,
            mode,
        })
    }
}

/// Maps a failed attach to the error frame sent back to the client.
pub(crate) fn rejection_for(err: &RoomError) -> Rejection {
    let code = match err {
        RoomError::InvalidRequest(_) => 400,
        RoomError::NotFound(_) | RoomError::MemberNotFound(..) => 404,
        RoomError::DuplicateParticipant(..) | RoomError::AlreadyPaired(..) => {
            409
        }
        RoomError::Unavailable(_) | RoomError::Store(_) => 500,
    };
    Rejection {
        code,
        error: err.to_string(),
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, K>(
    conn: WebSocketConnection,
    hub: Arc<Hub<S, K>>,
) -> Result<(), RoomcastError>
where
    S: MessageStore,
    K: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(
        %conn_id,
        peer = %conn.peer_addr(),
        target = conn.request_target(),
        "handling new connection"
    );

    let request = match JoinRequest::parse(conn.request_target()) {
        Ok(request) => request,
        Err(e) => {
            reject(&conn, hub.codec(), &e).await?;
            return Err(e.into());
        }
    };

    let conn = Arc::new(conn);
    let tasks = match hub
        .attach(
            &request.room,
            request.participant.clone(),
            Arc::clone(&conn),
            request.mode,
        )
        .await
    {
        Ok(tasks) => tasks,
        Err(e) => {
            reject(&conn, hub.codec(), &e).await?;
            return Err(e.into());
        }
    };

    tasks.join().await;
    tracing::debug!(
        %conn_id,
        room = %request.room,
        participant = %request.participant,
        "connection finished"
    );
    Ok(())
}

/// Sends the error frame for `err` and closes the connection.
async fn reject(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    err: &RoomError,
) -> Result<(), RoomcastError> {
    let rejection = rejection_for(err);
    tracing::info!(
        conn_id = %conn.id(),
        code = rejection.code,
        error = %rejection.error,
        "attach rejected"
    );
    let bytes = codec.encode(&rejection)?;
    conn.send(&bytes).await?;
    conn.close().await?;
    Ok(())
}
