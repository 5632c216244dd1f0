//! Client session controller for Atrium.
//!
//! The peer-side counterpart of the world host: owns the connection
//! lifecycle state machine, publishes the local peer's position at a fixed
//! rate, dispatches inbound world events to the application, and drives
//! the reconnect policy when the transport drops.
//!
//! # Shape
//!
//! [`WorldSession::connect`] spawns one driver task that owns the
//! connection end to end: dial, join, receive loop, publish timer, retry
//! loop. The handle talks to it through channels, and the session state is
//! observable through a `watch` ([`WorldSession::state`],
//! [`WorldSession::until_closed`]).
//!
//! The controller is generic over [`Connector`](atrium_transport::Connector)
//! and [`WorldDelegate`], so reconnect timing and event dispatch are
//! testable with a scripted connector and a paused clock — no sockets.

mod config;
mod delegate;
mod error;
mod session;
mod state;

pub use config::SessionConfig;
pub use delegate::WorldDelegate;
pub use error::ClientError;
pub use session::WorldSession;
pub use state::SessionState;
