//! Media subsystem seam for Atrium.
//!
//! Atrium does not move audio or data streams itself — an external media
//! subsystem (an SFU, a WebRTC stack, a data-channel relay) does. This
//! crate defines the [`MediaSystem`] trait: the narrow interface the world
//! layer uses to wire the fan-out graph between peers, without knowing
//! anything about transports or codecs behind it.
//!
//! The model is producer/consumer:
//!
//! - a **production** is an outbound stream a peer offers to the world,
//!   under a channel name like `"audio"` or `"data"`;
//! - a **consumption** is the receiving endpoint one peer holds on another
//!   peer's production.
//!
//! The world layer owns the handles and decides *which* edges exist (every
//! member consumes every other member's productions); the media subsystem
//! owns what the handles *mean*.
//!
//! # Why a trait?
//!
//! Same reason the rest of the codebase puts traits at its seams: the host
//! binary plugs in a real SFU, tests plug in a recording fake, and a host
//! that only relays events runs [`NullMedia`]. The world layer compiles
//! against all three.

use std::future::Future;

use atrium_transport::ConnectionId;

/// Errors surfaced by the external media subsystem.
///
/// Wiring failures are recoverable from the world's point of view: a
/// failed edge is logged and treated as absent, and the join or leave that
/// triggered it completes normally. A peer without an audio edge is better
/// than no peer at all.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Creating a production or consumption handle failed.
    #[error("media wiring failed: {0}")]
    Wiring(String),

    /// The media subsystem is gone (shutting down, lost its own backend).
    #[error("media subsystem unavailable")]
    Unavailable,
}

/// The external media subsystem.
///
/// Handle types are associated so implementations stay opaque to the
/// world layer — it stores them, passes them back, and never looks inside.
///
/// The methods return explicitly `Send` futures (instead of plain
/// `async fn`) because world actors await them behind a generic parameter
/// inside spawned tasks; implementations can still be written with
/// `async fn`.
///
/// # Ownership and closing
///
/// Handles move **by value** into the `close_*` methods, so the core closes
/// each handle exactly once; implementations must still tolerate a close of
/// an already-dead underlying resource (the remote end may have torn it
/// down first).
pub trait MediaSystem: Send + Sync + 'static {
    /// Handle to an outbound stream a peer offers. `Clone` because the
    /// world wires one production into many consumers.
    type Production: Clone + Send + Sync + 'static;

    /// Handle to one peer's receiving end of another peer's production.
    type Consumption: Send + 'static;

    /// Opens a production for `origin` on the named channel.
    fn open_production(
        &self,
        origin: ConnectionId,
        channel: &str,
    ) -> impl Future<Output = Result<Self::Production, MediaError>> + Send;

    /// Closes a production. The world calls this when the producing peer
    /// leaves or replaces the production for the same channel.
    fn close_production(&self, production: Self::Production) -> impl Future<Output = ()> + Send;

    /// Creates a consumption: `receiver` starts consuming `production`.
    fn consume(
        &self,
        receiver: ConnectionId,
        production: &Self::Production,
    ) -> impl Future<Output = Result<Self::Consumption, MediaError>> + Send;

    /// Closes a consumption, releasing the external resource.
    fn close_consumption(&self, consumption: Self::Consumption) -> impl Future<Output = ()> + Send;
}

/// A media subsystem that carries nothing.
///
/// For hosts that only relay events and positions, and for tests that do
/// not care about media wiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMedia;

impl MediaSystem for NullMedia {
    type Production = ();
    type Consumption = ();

    async fn open_production(
        &self,
        origin: ConnectionId,
        channel: &str,
    ) -> Result<(), MediaError> {
        tracing::debug!(%origin, channel, "null media: production opened");
        Ok(())
    }

    async fn close_production(&self, _production: ()) {}

    async fn consume(
        &self,
        _receiver: ConnectionId,
        _production: &(),
    ) -> Result<(), MediaError> {
        Ok(())
    }

    async fn close_consumption(&self, _consumption: ()) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_media_wires_nothing_and_never_fails() {
        let media = NullMedia;
        let conn = ConnectionId::new(1);

        let production = media
            .open_production(conn, "audio")
            .await
            .expect("null production should open");
        media
            .consume(ConnectionId::new(2), &production)
            .await
            .expect("null consumption should open");
        media.close_consumption(()).await;
        media.close_production(production).await;
    }
}
