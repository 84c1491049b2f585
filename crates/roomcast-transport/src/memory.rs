//! In-process connection pair, for tests and for embedding the hub
//! without a network listener.

use tokio::sync::{mpsc, watch, Mutex};

use crate::{Connection, ConnectionId, TransportError};

/// The server-side end of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: std::sync::Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    closed: watch::Sender<bool>,
}

/// The remote end of a [`MemoryConnection`]: what a client would hold.
///
/// Dropping the peer (or calling [`hang_up`](Self::hang_up)) looks like a
/// clean close to the server side. [`stop_reading`](Self::stop_reading)
/// breaks only the server-to-client direction, so the server's next send
/// fails while its reads keep working.
pub struct MemoryPeer {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl MemoryConnection {
    /// Creates a connected pair.
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let (to_server, inbound) = mpsc::unbounded_channel();
        let (outbound, from_server) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);

        let conn = MemoryConnection {
            id: ConnectionId::next(),
            inbound: Mutex::new(inbound),
            outbound: std::sync::Mutex::new(Some(outbound)),
            closed,
        };
        let peer = MemoryPeer {
            tx: Some(to_server),
            rx: Some(from_server),
        };
        (conn, peer)
    }

    /// Returns `true` once [`close`](Connection::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let sender = match self.outbound.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match sender {
            Some(tx) => tx.send(data.to_vec()).map_err(|_| {
                TransportError::ConnectionClosed("peer hung up".into())
            }),
            None => Err(TransportError::ConnectionClosed(
                "connection closed locally".into(),
            )),
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut closed = self.closed.subscribe();
        let already_closed = *closed.borrow_and_update();
        if already_closed {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            frame = inbound.recv() => Ok(frame),
            _ = closed.changed() => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        match self.outbound.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        self.closed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

impl MemoryPeer {
    /// Sends a frame to the server side. Returns `false` if it is gone.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> bool {
        match &self.tx {
            Some(tx) => tx.send(data.into()).is_ok(),
            None => false,
        }
    }

    /// Waits for the next frame from the server side. `None` once the
    /// server closed the connection and everything sent was read.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.as_mut()?.recv().await
    }

    /// Returns the next frame if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.as_mut()?.try_recv().ok()
    }

    /// Closes the client-to-server direction.
    pub fn hang_up(&mut self) {
        self.tx.take();
    }

    /// Drops the server-to-client direction. Frames still buffered are
    /// lost and every later server send fails.
    pub fn stop_reading(&mut self) {
        self.rx.take();
    }
}
