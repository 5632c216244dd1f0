//! Transport abstraction layer for Atrium.
//!
//! Provides the [`Transport`], [`Connection`], and [`Connector`] traits
//! that abstract over the network protocol. The host accepts connections
//! through a [`Transport`]; the client session controller dials through a
//! [`Connector`]; both ends exchange opaque binary frames through
//! [`Connection`].
//!
//! The world layer never touches sockets — it refers to connections only
//! by [`ConnectionId`], a non-owning handle. The socket itself stays owned
//! by the connection handler task.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    ClientWebSocketConnection, ServerWebSocketConnection, WebSocketConnection, WebSocketConnector,
    WebSocketTransport,
};

use std::fmt;

/// Opaque identifier for a connection.
///
/// This is the only reference to a connection the world layer holds:
/// process-unique, `Copy`, and meaningless once the connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections (host side).
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// Opens outbound connections (client side).
///
/// The session controller is generic over this, so reconnect behavior can
/// be exercised in tests with a scripted connector instead of sockets.
///
/// Declared with explicitly `Send` futures (rather than plain `async fn`)
/// because the session driver awaits these behind a generic parameter from
/// a spawned task; implementations can still be written with `async fn`.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Dials the given address.
    fn connect(
        &self,
        addr: &str,
    ) -> impl std::future::Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single connection that can send and receive binary frames.
///
/// Same `Send`-future form as [`Connector`], for the same reason.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends a frame to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
