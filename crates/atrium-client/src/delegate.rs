//! The application-side collaborator that receives world events.

use std::collections::HashMap;

use atrium_protocol::{Location, PeerId};

/// Receives inbound world events and session notifications.
///
/// Implemented by the local scene/UI layer. All methods have no-op
/// defaults — implement the ones the application cares about.
///
/// Methods are called from the session's receive loop and must not block:
/// hand anything expensive off to the application's own executor or
/// channels.
pub trait WorldDelegate: Send + Sync + 'static {
    /// The join was accepted; `own_id` is this peer's id in the world.
    fn joined(&self, own_id: PeerId) {
        let _ = own_id;
    }

    /// The host refused the join (world full). The session shuts down and
    /// will not retry.
    fn join_denied(&self, reason: &str) {
        let _ = reason;
    }

    /// Another peer entered the world (also delivered once per existing
    /// member right after joining, to rebuild the roster).
    fn peer_joined(&self, id: PeerId, data: &HashMap<String, String>) {
        let _ = (id, data);
    }

    /// A peer left the world.
    fn peer_left(&self, id: PeerId) {
        let _ = id;
    }

    /// A chat line from another peer.
    fn chat(&self, id: PeerId, text: &str) {
        let _ = (id, text);
    }

    /// One entry of another peer's public data changed.
    fn state_updated(&self, id: PeerId, key: &str, value: &str) {
        let _ = (id, key, value);
    }

    /// An application-defined event from another peer.
    fn event(&self, id: PeerId, data: &[u8]) {
        let _ = (id, data);
    }

    /// Another peer's position update.
    fn peer_moved(&self, id: PeerId, location: &Location) {
        let _ = (id, location);
    }

    /// The transport dropped; the reconnect loop is starting.
    fn connection_lost(&self) {}

    /// Every reconnection attempt failed; the session is permanently
    /// down until the application builds a new one.
    fn reconnect_exhausted(&self) {}
}
