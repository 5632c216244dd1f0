//! # Atrium
//!
//! A real-time multiplayer world host: turns independent client
//! connections into shared worlds with consistent membership, small
//! room-local peer ids, broadcast events, and a fan-out media graph wired
//! through an external media subsystem.
//!
//! This crate is the glue: it binds the transport, decodes the wire
//! protocol, and routes each connection's messages into the world layer.
//! The interesting invariants (id allocation, join/leave protocols,
//! broadcast scope, registry lifecycle) live in `atrium-world`; the client
//! counterpart lives in `atrium-client`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use atrium::HostServer;
//! use atrium_media::NullMedia;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), atrium::AtriumError> {
//!     let server = HostServer::<NullMedia>::builder()
//!         .bind("0.0.0.0:4000")
//!         .build(NullMedia)
//!         .await?;
//!     server.run().await
//! }
//! ```

mod error;
mod handler;
mod server;

pub use error::AtriumError;
pub use server::{HostServer, HostServerBuilder};

pub use atrium_media::{MediaError, MediaSystem, NullMedia};
pub use atrium_protocol::PeerId;
pub use atrium_world::{WorldError, WorldHandle, WorldRegistry};
