//! Error types for the client session layer.

use atrium_transport::TransportError;

/// Errors surfaced by a [`WorldSession`](crate::WorldSession).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A transport-level failure (dial, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session's driver task has ended; no more operations are
    /// possible on this handle.
    #[error("session is closed")]
    SessionClosed,

    /// Every reconnection attempt failed; the session gave up.
    #[error("gave up after {0} reconnection attempts")]
    ReconnectExhausted(u32),
}
