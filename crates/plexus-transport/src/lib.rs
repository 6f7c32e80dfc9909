//! Byte transports for Plexus links.
//!
//! A [`Connection`] moves whole buffers: one `send` on one side is one
//! `recv` on the other, so a poked net message always arrives as a single
//! datagram. A [`Transport`] accepts connections.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket binary frames via `tokio-tungstenite`
//!
//! [`LoopbackConnection`] is always available. It joins two endpoints in
//! memory and is what tests and single-process setups use.

#![allow(async_fn_in_trait)]

mod error;
mod loopback;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use loopback::LoopbackConnection;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// A process-wide unique id. Never 0.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts incoming connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops accepting new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One peer, exchanging whole buffers.
///
/// The futures are `Send` so a link over any connection can run on a
/// spawned task. Implementations may still use `async fn`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// The next buffer from the peer. `Ok(None)` on a clean close.
    ///
    /// Must be cancel-safe: a link loop races it against its outbound
    /// queue in `tokio::select!`.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Sends over an unreliable channel where the transport has one.
    /// Defaults to [`Self::send`].
    fn send_unreliable(&self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send {
        self.send(data)
    }

    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn id(&self) -> ConnectionId;
}
