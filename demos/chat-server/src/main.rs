use clap::Parser;
use roomcast::prelude::*;
use roomcast::DEFAULT_BIND_ADDR;
use roomcast::room::{DEFAULT_COMMAND_CHANNEL_SIZE, DEFAULT_OUTBOUND_CAPACITY};
use tracing_subscriber::EnvFilter;

/// Chat rooms over WebSocket, kept in memory.
///
/// Connect to `/create?room=<name>&id=<you>` or `/ws?room=<name>&id=<you>`
/// and send `{"content": "...", "recipientid": "all"}`.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "ROOMCAST_BIND", default_value = DEFAULT_BIND_ADDR)]
    bind: String,

    /// Messages buffered per client before new ones are dropped for it.
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_CAPACITY)]
    outbound_capacity: usize,

    /// Pending joins, leaves and messages per room before senders wait.
    #[arg(long, default_value_t = DEFAULT_COMMAND_CHANNEL_SIZE)]
    command_channel_size: usize,
}

impl Args {
    fn hub_config(&self) -> HubConfig {
        HubConfig {
            outbound_capacity: self.outbound_capacity,
            command_channel_size: self.command_channel_size,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(bind = %args.bind, "starting chat server");

    let server = RoomcastServerBuilder::new()
        .bind(&args.bind)
        .hub_config(args.hub_config())
        .build(MemoryStore::new())
        .await?;

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    type Ws = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn start(
        config: HubConfig,
    ) -> (String, std::sync::Arc<Hub<MemoryStore>>) {
        let server = RoomcastServerBuilder::new()
            .bind("127.0.0.1:0")
            .hub_config(config)
            .build(MemoryStore::new())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let hub = server.hub();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        (addr, hub)
    }

    async fn ws(addr: &str, target: &str) -> Ws {
        let (ws, _) =
            tokio_tungstenite::connect_async(format!("ws://{addr}{target}"))
                .await
                .unwrap();
        ws
    }

    async fn recv_json(ws: &mut Ws) -> serde_json::Value {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_slice(&msg.into_data()).unwrap()
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["chat-server"]).unwrap();
        assert_eq!(args.outbound_capacity, 256);
        assert_eq!(args.command_channel_size, 64);
        assert_eq!(args.hub_config(), HubConfig::default());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "chat-server",
            "--bind",
            "0.0.0.0:9000",
            "--outbound-capacity",
            "8",
        ])
        .unwrap();
        assert_eq!(args.bind, "0.0.0.0:9000");
        assert_eq!(args.hub_config().outbound_capacity, 8);
    }

    #[tokio::test]
    async fn chat_round_trip() {
        let (addr, hub) = start(HubConfig::default()).await;
        let lobby = RoomName::new("lobby").unwrap();

        let mut ann = ws(&addr, "/create?room=lobby&id=ann").await;
        let mut ben = ws(&addr, "/create?room=lobby&id=ben").await;

        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let joined = hub.live_members(&lobby).await.map(|m| m.len());
                if joined.unwrap_or(0) == 2 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        ann.send(WsMessage::Text(
            r#"{"content":"hello ben","recipientid":"ben","type":"text"}"#.into(),
        ))
        .await
        .unwrap();

        let direct = recv_json(&mut ben).await;
        assert_eq!(direct["content"], "hello ben");
        assert_eq!(direct["sender"], "ann");

        ben.send(WsMessage::Text(r#"{"content":"hi all"}"#.into()))
            .await
            .unwrap();

        assert_eq!(recv_json(&mut ben).await["content"], "hi all");
        let to_ann = recv_json(&mut ann).await;
        assert_eq!(to_ann["content"], "hi all");
        assert_eq!(to_ann["sender"], "ben");
    }
}
