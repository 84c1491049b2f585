//! Integration tests for the roomcast server over real WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use roomcast::prelude::*;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as WsMessage;

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

// =========================================================================
// Helpers
// =========================================================================

/// Starts a server on a random port and returns its address and hub.
async fn start_server() -> (String, Arc<Hub<MemoryStore>>) {
    let server = RoomcastServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(MemoryStore::new())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let hub = server.hub();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, hub)
}

async fn connect(addr: &str, target: &str) -> ClientWs {
    let (ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}{target}"))
            .await
            .expect("should connect");
    ws
}

/// Waits for the next data frame and parses it as JSON.
async fn next_json(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        match msg {
            WsMessage::Text(_) | WsMessage::Binary(_) => {
                return serde_json::from_slice(&msg.into_data())
                    .expect("frame should be JSON");
            }
            _ => continue,
        }
    }
}

async fn send_json(ws: &mut ClientWs, json: &str) {
    ws.send(WsMessage::Text(json.into())).await.expect("send");
}

/// Asserts the server closes the connection after its last frame.
async fn expect_closed(ws: &mut ClientWs) {
    let ended = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(WsMessage::Close(_))) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "server should close the connection");
}

async fn wait_for_live(
    hub: &Hub<MemoryStore>,
    room: &RoomName,
    expected: &[ParticipantId],
) {
    let polled = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(members) = hub.live_members(room).await {
                if members == expected {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "live members never became {expected:?}");
}

fn pid(id: &str) -> ParticipantId {
    ParticipantId::new(id).unwrap()
}

fn room(name: &str) -> RoomName {
    RoomName::new(name).unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_create_then_join_and_broadcast() {
    let (addr, hub) = start_server().await;

    let mut alice = connect(&addr, "/create?room=r1&id=alice").await;
    wait_for_live(&hub, &room("r1"), &[pid("alice")]).await;
    let mut bob = connect(&addr, "/ws?room=r1&id=bob").await;
    wait_for_live(&hub, &room("r1"), &[pid("alice"), pid("bob")]).await;

    send_json(&mut alice, r#"{"content":"hi","recipientid":"all"}"#).await;

    for ws in [&mut alice, &mut bob] {
        let msg = next_json(ws).await;
        assert_eq!(msg["content"], "hi");
        assert_eq!(msg["sender"], "alice");
        assert_eq!(msg["roomname"], "r1");
        assert!(!msg["time"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_direct_message_reaches_only_recipient() {
    let (addr, hub) = start_server().await;

    let mut alice = connect(&addr, "/create?room=r1&id=alice").await;
    wait_for_live(&hub, &room("r1"), &[pid("alice")]).await;
    let mut bob = connect(&addr, "/ws?room=r1&id=bob").await;
    wait_for_live(&hub, &room("r1"), &[pid("alice"), pid("bob")]).await;

    send_json(&mut alice, r#"{"content":"psst","recipientid":"bob"}"#).await;
    send_json(&mut alice, r#"{"content":"everyone","recipientid":"all"}"#)
        .await;

    assert_eq!(next_json(&mut bob).await["content"], "psst");
    assert_eq!(next_json(&mut bob).await["content"], "everyone");
    assert_eq!(next_json(&mut alice).await["content"], "everyone");
}

#[tokio::test]
async fn test_join_unknown_room_is_rejected() {
    let (addr, hub) = start_server().await;

    let mut ws = connect(&addr, "/ws?room=ghost&id=alice").await;
    let rejection = next_json(&mut ws).await;
    assert_eq!(rejection["code"], 404);
    assert!(rejection["error"].as_str().unwrap().contains("ghost"));
    expect_closed(&mut ws).await;

    assert_eq!(hub.room_count().await, 0);
}

#[tokio::test]
async fn test_missing_parameters_are_rejected() {
    let (addr, _hub) = start_server().await;

    let mut ws = connect(&addr, "/create?room=r1").await;
    assert_eq!(next_json(&mut ws).await["code"], 400);
    expect_closed(&mut ws).await;

    let mut ws = connect(&addr, "/chat?room=r1&id=a").await;
    assert_eq!(next_json(&mut ws).await["code"], 400);
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_duplicate_identity_is_rejected() {
    let (addr, hub) = start_server().await;

    let _alice = connect(&addr, "/create?room=r1&id=alice").await;
    wait_for_live(&hub, &room("r1"), &[pid("alice")]).await;

    let mut again = connect(&addr, "/ws?room=r1&id=alice").await;
    assert_eq!(next_json(&mut again).await["code"], 409);
    expect_closed(&mut again).await;
}

#[tokio::test]
async fn test_client_disconnect_leaves_room() {
    let (addr, hub) = start_server().await;

    let alice = connect(&addr, "/create?room=r1&id=alice").await;
    let _bob = connect(&addr, "/create?room=r1&id=bob").await;
    wait_for_live(&hub, &room("r1"), &[pid("alice"), pid("bob")]).await;

    drop(alice);
    wait_for_live(&hub, &room("r1"), &[pid("bob")]).await;
}

#[tokio::test]
async fn test_forced_detach_closes_client() {
    let (addr, hub) = start_server().await;

    let mut alice = connect(&addr, "/create?room=r1&id=alice").await;
    wait_for_live(&hub, &room("r1"), &[pid("alice")]).await;

    let removed = hub.detach_member(&room("r1"), &pid("alice")).await.unwrap();
    assert_eq!(removed, 1);
    expect_closed(&mut alice).await;
}

#[tokio::test]
async fn test_history_and_room_listing() {
    let (addr, hub) = start_server().await;

    let mut alice = connect(&addr, "/create?room=lobby&id=alice").await;
    wait_for_live(&hub, &room("lobby"), &[pid("alice")]).await;
    send_json(&mut alice, r#"{"content":"one","type":"text"}"#).await;
    send_json(&mut alice, r#"{"content":"two","type":"image"}"#).await;
    next_json(&mut alice).await;
    next_json(&mut alice).await;

    assert_eq!(hub.list_rooms().await.unwrap(), vec![room("lobby")]);
    assert_eq!(
        hub.list_members(&room("lobby")).await.unwrap(),
        vec![pid("alice")]
    );

    let history = hub.history(&room("lobby")).await.unwrap();
    assert_eq!(history.len(), 2);
    let images = hub
        .history_by_kind(&room("lobby"), &MessageKind::new("image"))
        .await
        .unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].content, "two");
}

#[tokio::test]
async fn test_silent_client_does_not_block_other_clients() {
    let (addr, hub) = start_server().await;

    // Opens TCP and never sends the upgrade request.
    let _silent = tokio::net::TcpStream::connect(&addr)
        .await
        .expect("tcp connect");

    let mut ann = tokio::time::timeout(
        Duration::from_secs(3),
        connect(&addr, "/create?room=lobby&id=ann"),
    )
    .await
    .expect("a stalled handshake must not hold up the next client");
    wait_for_live(&hub, &room("lobby"), &[pid("ann")]).await;

    send_json(&mut ann, r#"{"content":"still here"}"#).await;
    assert_eq!(next_json(&mut ann).await["content"], "still here");
}
