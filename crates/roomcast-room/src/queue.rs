//! Per-connection outbound queue and the `best-effort-delivery` policy.
//!
//! Each connection owns one bounded FIFO of encoded frames. The room's
//! control loop is the only producer and the connection's writer pump the
//! only consumer. Producers never wait: a full queue drops the frame for
//! that connection and fan-out carries on with the next member, so a slow
//! consumer can't stall its room.
//!
//! Closing is done by dropping the [`OutboundSender`]. The writer then
//! drains what is left and sees the end of the queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One encoded message, shared by every member it is fanned out to.
pub type Frame = Arc<[u8]>;

/// Outcome of offering a frame to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The frame is queued for the writer.
    Enqueued,
    /// The queue was full and the frame was dropped for this connection.
    Dropped,
    /// The writer is gone; nothing will be delivered.
    Closed,
}

/// Producer side. Deliberately not `Clone`: whoever holds it decides when
/// the queue closes.
#[derive(Debug)]
pub struct OutboundSender {
    tx: mpsc::Sender<Frame>,
}

/// Consumer side, drained by the connection's writer pump.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::Receiver<Frame>,
}

/// Creates a queue holding at most `capacity` frames (at least one).
pub fn outbound_queue(capacity: usize) -> (OutboundSender, OutboundReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (OutboundSender { tx }, OutboundReceiver { rx })
}

impl OutboundSender {
    /// Offers a frame without waiting (`best-effort-delivery`).
    pub fn offer(&self, frame: Frame) -> Offer {
        match self.tx.try_send(frame) {
            Ok(()) => Offer::Enqueued,
            Err(TrySendError::Full(_)) => Offer::Dropped,
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    /// Returns `true` once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl OutboundReceiver {
    /// Waits for the next frame. `None` once the sender is dropped and
    /// every queued frame has been taken.
    pub async fn next(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Takes the next frame if one is waiting.
    pub fn try_next(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Returns `true` if the sender is gone, whether or not frames remain.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> Frame {
        Frame::from(text.as_bytes())
    }

    #[test]
    fn test_offer_enqueues_in_fifo_order() {
        let (tx, mut rx) = outbound_queue(4);
        assert_eq!(tx.offer(frame("a")), Offer::Enqueued);
        assert_eq!(tx.offer(frame("b")), Offer::Enqueued);

        assert_eq!(rx.try_next().as_deref(), Some(&b"a"[..]));
        assert_eq!(rx.try_next().as_deref(), Some(&b"b"[..]));
        assert!(rx.try_next().is_none());
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (tx, mut rx) = outbound_queue(2);
        assert_eq!(tx.offer(frame("1")), Offer::Enqueued);
        assert_eq!(tx.offer(frame("2")), Offer::Enqueued);
        assert_eq!(tx.offer(frame("3")), Offer::Dropped);

        assert_eq!(rx.try_next().as_deref(), Some(&b"1"[..]));
        assert_eq!(rx.try_next().as_deref(), Some(&b"2"[..]));
        assert!(rx.try_next().is_none(), "dropped frame must not appear");
    }

    #[test]
    fn test_offer_after_receiver_dropped_reports_closed() {
        let (tx, rx) = outbound_queue(2);
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.offer(frame("x")), Offer::Closed);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (tx, _rx) = outbound_queue(0);
        assert_eq!(tx.offer(frame("x")), Offer::Enqueued);
        assert_eq!(tx.offer(frame("y")), Offer::Dropped);
    }

    #[tokio::test]
    async fn test_dropping_sender_drains_then_ends() {
        let (tx, mut rx) = outbound_queue(4);
        tx.offer(frame("last"));
        drop(tx);

        assert!(rx.is_closed());
        assert_eq!(rx.next().await.as_deref(), Some(&b"last"[..]));
        assert!(rx.next().await.is_none());
    }
}
