//! The per-peer record owned by a world actor.

use std::collections::HashMap;

use atrium_media::MediaSystem;
use atrium_protocol::{from_host, PeerId};
use atrium_transport::ConnectionId;
use tokio::sync::mpsc;

/// Channel sender for delivering outbound messages to a peer's connection
/// handler, which encodes and writes them to the socket.
pub type PeerSender = mpsc::UnboundedSender<from_host::Msg>;

/// One connected participant of a world.
///
/// The peer owns its outbound channel, its public data, its production
/// handles, and the consumption handles it holds on other peers'
/// productions. It does **not** own the connection — [`ConnectionId`] is a
/// non-owning reference, and the socket stays with the transport layer.
///
/// There is deliberately no back-reference to the world or to other peers;
/// the world resolves "which id does this connection hold" by scanning its
/// peer map.
pub(crate) struct Peer<M: MediaSystem> {
    conn: ConnectionId,
    sender: PeerSender,
    /// Public key/value data, included in the `PeerJoined` announcement so
    /// late joiners see the current value.
    data: HashMap<String, String>,
    /// Productions this peer offers, by channel name ("audio", "data", …).
    productions: HashMap<String, M::Production>,
    /// Consumptions this peer holds, keyed by (producing peer, channel).
    /// Every handle in here must be closed before the producing peer — or
    /// this peer — is discarded.
    consumptions: HashMap<(PeerId, String), M::Consumption>,
}

impl<M: MediaSystem> Peer<M> {
    pub(crate) fn new(
        conn: ConnectionId,
        sender: PeerSender,
        data: HashMap<String, String>,
        productions: HashMap<String, M::Production>,
    ) -> Self {
        Self {
            conn,
            sender,
            data,
            productions,
            consumptions: HashMap::new(),
        }
    }

    pub(crate) fn conn(&self) -> ConnectionId {
        self.conn
    }

    pub(crate) fn data(&self) -> &HashMap<String, String> {
        &self.data
    }

    pub(crate) fn set_data(&mut self, key: String, value: String) {
        self.data.insert(key, value);
    }

    /// Queues an outbound message. Silently drops if the connection
    /// handler is gone — the peer is about to be reaped anyway.
    pub(crate) fn send(&self, msg: from_host::Msg) {
        let _ = self.sender.send(msg);
    }

    /// Snapshot of this peer's productions, for wiring loops that must not
    /// hold a borrow across an await.
    pub(crate) fn productions_cloned(&self) -> Vec<(String, M::Production)> {
        self.productions
            .iter()
            .map(|(channel, production)| (channel.clone(), production.clone()))
            .collect()
    }

    /// Records a production handle; returns the replaced one, which the
    /// caller must close.
    pub(crate) fn insert_production(
        &mut self,
        channel: String,
        production: M::Production,
    ) -> Option<M::Production> {
        self.productions.insert(channel, production)
    }

    pub(crate) fn insert_consumption(
        &mut self,
        origin: PeerId,
        channel: String,
        consumption: M::Consumption,
    ) {
        self.consumptions.insert((origin, channel), consumption);
    }

    pub(crate) fn remove_consumption(
        &mut self,
        key: &(PeerId, String),
    ) -> Option<M::Consumption> {
        self.consumptions.remove(key)
    }

    /// Keys of every consumption this peer holds on `origin`'s productions.
    pub(crate) fn consumption_keys_for(&self, origin: PeerId) -> Vec<(PeerId, String)> {
        self.consumptions
            .keys()
            .filter(|(peer, _)| *peer == origin)
            .cloned()
            .collect()
    }

    /// Takes every consumption handle out of the peer, for close-out
    /// before the peer is discarded.
    pub(crate) fn drain_consumptions(&mut self) -> Vec<M::Consumption> {
        self.consumptions.drain().map(|(_, c)| c).collect()
    }

    /// Takes every production handle out of the peer.
    pub(crate) fn drain_productions(&mut self) -> Vec<M::Production> {
        self.productions.drain().map(|(_, p)| p).collect()
    }
}
