//! `RoomcastServer` builder and accept loop.
//!
//! This is the entry point for running a roomcast hub over WebSocket. It
//! ties together all the layers: transport → protocol → room → store.

use std::sync::Arc;
use std::time::Duration;

use roomcast_protocol::{Codec, JsonCodec};
use roomcast_room::{Hub, HubConfig};
use roomcast_store::MessageStore;
use roomcast_transport::{PendingWebSocket, WebSocketTransport};

use crate::handler::handle_connection;
use crate::RoomcastError;

/// Address used when [`RoomcastServerBuilder::bind`] is not called.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// How long a client gets to finish the WebSocket handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for configuring and starting a roomcast server.
///
/// # Example
///
/// ```rust,no_run
/// use roomcast::prelude::*;
///
/// # async fn run() -> Result<(), RoomcastError> {
/// let server = RoomcastServerBuilder::new()
///     .bind("0.0.0.0:8000")
///     .build(MemoryStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RoomcastServerBuilder<K: Codec = JsonCodec> {
    bind_addr: String,
    hub_config: HubConfig,
    codec: K,
}

impl RoomcastServerBuilder<JsonCodec> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            hub_config: HubConfig::default(),
            codec: JsonCodec,
        }
    }
}

impl Default for RoomcastServerBuilder<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Codec> RoomcastServerBuilder<K> {
    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets queue and channel sizes for every room.
    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.hub_config = config;
        self
    }

    /// Replaces the wire codec.
    pub fn codec<K2: Codec>(self, codec: K2) -> RoomcastServerBuilder<K2> {
        RoomcastServerBuilder {
            bind_addr: self.bind_addr,
            hub_config: self.hub_config,
            codec,
        }
    }

    /// Binds the listener and creates the hub over `store`.
    pub async fn build<S: MessageStore>(
        self,
        store: S,
    ) -> Result<RoomcastServer<S, K>, RoomcastError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let hub = Arc::new(Hub::with_codec(store, self.codec, self.hub_config));
        Ok(RoomcastServer { transport, hub })
    }
}

/// A bound roomcast server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RoomcastServer<S: MessageStore, K: Codec = JsonCodec> {
    transport: WebSocketTransport,
    hub: Arc<Hub<S, K>>,
}

impl<S: MessageStore, K: Codec> RoomcastServer<S, K> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The hub behind this server, for the control operations that have
    /// no wire route (listing, history, forced detach).
    pub fn hub(&self) -> Arc<Hub<S, K>> {
        Arc::clone(&self.hub)
    }

    /// Runs the accept loop.
    ///
    /// The loop itself only accepts TCP connections. The WebSocket
    /// handshake and everything after it run on a task per connection,
    /// bounded by [`HANDSHAKE_TIMEOUT`]. Runs until the process is
    /// terminated; a failed accept is logged and skipped.
    pub async fn run(mut self) -> Result<(), RoomcastError> {
        if let Ok(addr) = self.local_addr() {
            tracing::info!(%addr, "roomcast server listening");
        }

        loop {
            match self.transport.accept_pending().await {
                Ok(pending) => {
                    let hub = Arc::clone(&self.hub);
                    tokio::spawn(serve(pending, hub));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Finishes the handshake for one connection, then hands it to the handler.
async fn serve<S: MessageStore, K: Codec>(
    pending: PendingWebSocket,
    hub: Arc<Hub<S, K>>,
) {
    let peer = pending.peer_addr();
    let conn =
        match tokio::time::timeout(HANDSHAKE_TIMEOUT, pending.upgrade()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::debug!(%peer, error = %e, "handshake failed");
                return;
            }
            Err(_) => {
                tracing::debug!(%peer, "handshake timed out");
                return;
            }
        };

    if let Err(e) = handle_connection(conn, hub).await {
        tracing::debug!(error = %e, "connection ended with error");
    }
}
