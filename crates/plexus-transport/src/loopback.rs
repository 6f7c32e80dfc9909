//! In-memory connection pairs.

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, TransportError};

/// One end of an in-memory link made by [`LoopbackConnection::pair`].
///
/// Buffers are delivered whole and in order. Closing either end (or
/// dropping it) makes the other end's `recv` return `Ok(None)` once the
/// buffers already sent have been read.
pub struct LoopbackConnection {
    id: ConnectionId,
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl LoopbackConnection {
    /// Two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        let a = Self {
            id: ConnectionId::next(),
            tx: Mutex::new(Some(a_tx)),
            rx: Mutex::new(a_rx),
        };
        let b = Self {
            id: ConnectionId::next(),
            tx: Mutex::new(Some(b_tx)),
            rx: Mutex::new(b_rx),
        };
        tracing::trace!(a = %a.id, b = %b.id, "loopback pair created");
        (a, b)
    }
}

impl Connection for LoopbackConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let tx = self.tx.lock().await;
        let Some(tx) = tx.as_ref() else {
            return Err(TransportError::ConnectionClosed(format!("{} closed locally", self.id)));
        };
        tx.send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed(format!("{} peer dropped", self.id)))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.tx.lock().await.take().is_some() {
            tracing::debug!(id = %self.id, "loopback connection closed");
        }
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffers_arrive_whole_and_in_order() {
        let (a, b) = LoopbackConnection::pair();
        a.send(b"one").await.unwrap();
        a.send(b"").await.unwrap();
        a.send(b"three").await.unwrap();

        assert_eq!(b.recv().await.unwrap().unwrap(), b"one");
        assert_eq!(b.recv().await.unwrap().unwrap(), b"");
        assert_eq!(b.recv().await.unwrap().unwrap(), b"three");
    }

    #[tokio::test]
    async fn test_both_directions() {
        let (a, b) = LoopbackConnection::pair();
        assert_ne!(a.id(), b.id());
        b.send(b"pong").await.unwrap();
        a.send(b"ping").await.unwrap();
        assert_eq!(a.recv().await.unwrap().unwrap(), b"pong");
        assert_eq!(b.recv().await.unwrap().unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let (a, b) = LoopbackConnection::pair();
        a.send(b"last").await.unwrap();
        a.close().await.unwrap();
        a.close().await.unwrap();

        assert_eq!(b.recv().await.unwrap().unwrap(), b"last");
        assert!(b.recv().await.unwrap().is_none());
        assert!(matches!(
            a.send(b"late").await,
            Err(TransportError::ConnectionClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_send_to_dropped_peer_fails() {
        let (a, b) = LoopbackConnection::pair();
        drop(b);
        assert!(a.send(b"anyone?").await.is_err());
        assert!(a.recv().await.unwrap().is_none());
    }
}
