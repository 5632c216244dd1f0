//! World actor: an isolated Tokio task that owns one world's membership.
//!
//! Each world runs in its own task, communicating with the outside world
//! through an mpsc channel. This is the "actor model" — no shared mutable
//! state, just message passing. It is also the concurrency contract: the
//! join and leave protocols await external media calls, and because the
//! actor processes one command at a time, those suspension points can
//! never interleave two joins or a join and a leave on the same world. A
//! leave that arrives while a join is still in flight simply queues behind
//! it in channel order.

use std::collections::HashMap;
use std::sync::Arc;

use atrium_media::MediaSystem;
use atrium_protocol::{
    event_message, from_host, world_event, ChatMessage, CustomEvent, Location, PeerId, PeerJoined,
    PeerLeft, PeerLocation, StateUpdate,
};
use atrium_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::ids::IdAllocator;
use crate::peer::{Peer, PeerSender};
use crate::registry::RegistryRef;
use crate::WorldError;

/// Operations sent to a world actor through its channel.
///
/// Variants with a `oneshot::Sender` are request/reply: the caller must
/// observe completion (a join needs its id, a production swap must finish
/// re-wiring before the call returns). The rest are fire-and-forget
/// broadcasts.
pub(crate) enum WorldCommand<M: MediaSystem> {
    Join {
        conn: ConnectionId,
        sender: PeerSender,
        data: HashMap<String, String>,
        productions: HashMap<String, M::Production>,
        reply: oneshot::Sender<Result<PeerId, WorldError>>,
    },
    Leave {
        conn: ConnectionId,
        reply: oneshot::Sender<()>,
    },
    Chat {
        conn: ConnectionId,
        text: String,
    },
    SetState {
        conn: ConnectionId,
        key: String,
        value: String,
    },
    SendEvent {
        conn: ConnectionId,
        data: Vec<u8>,
    },
    SetLocation {
        conn: ConnectionId,
        location: Location,
    },
    SetProduction {
        conn: ConnectionId,
        channel: String,
        production: M::Production,
        reply: oneshot::Sender<()>,
    },
    PeerCount {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Handle to a running world actor.
///
/// Cheap to clone — an `mpsc::Sender` plus the key. The registry holds one
/// per world; connection handlers hold one per membership.
pub struct WorldHandle<M: MediaSystem> {
    key: Arc<str>,
    sender: mpsc::Sender<WorldCommand<M>>,
}

impl<M: MediaSystem> Clone for WorldHandle<M> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
            sender: self.sender.clone(),
        }
    }
}

impl<M: MediaSystem> WorldHandle<M> {
    /// The opaque world key this world was created for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The publish-channel name for this world, derived deterministically
    /// from the key.
    pub fn topic(&self) -> String {
        format!("world/{}", self.key)
    }

    /// Whether the actor behind this handle has stopped.
    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> WorldError {
        WorldError::Unavailable(self.key.to_string())
    }

    /// Adds a peer to the world.
    ///
    /// `data` is the peer's public data; `productions` are media handles
    /// already opened for channels the peer declared at join time.
    ///
    /// # Errors
    /// [`WorldError::WorldFull`] if all 256 ids are taken (the world is
    /// left untouched); [`WorldError::Unavailable`] if the actor is gone —
    /// re-fetch the handle from the registry and retry.
    pub async fn join(
        &self,
        conn: ConnectionId,
        sender: PeerSender,
        data: HashMap<String, String>,
        productions: HashMap<String, M::Production>,
    ) -> Result<PeerId, WorldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorldCommand::Join {
                conn,
                sender,
                data,
                productions,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Removes a peer from the world. A leave for a connection that is not
    /// a member (double-leave, join raced with a disconnect) is a no-op.
    pub async fn leave(&self, conn: ConnectionId) -> Result<(), WorldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorldCommand::Leave {
                conn,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Broadcasts a chat line from `conn` to every other member.
    pub async fn chat(&self, conn: ConnectionId, text: String) -> Result<(), WorldError> {
        self.sender
            .send(WorldCommand::Chat { conn, text })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Updates one entry of the peer's public data and broadcasts the
    /// change to every other member.
    pub async fn set_state(
        &self,
        conn: ConnectionId,
        key: String,
        value: String,
    ) -> Result<(), WorldError> {
        self.sender
            .send(WorldCommand::SetState { conn, key, value })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Broadcasts an application-defined event to every other member.
    pub async fn send_event(&self, conn: ConnectionId, data: Vec<u8>) -> Result<(), WorldError> {
        self.sender
            .send(WorldCommand::SendEvent { conn, data })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Relays the peer's position to every other member.
    pub async fn set_location(
        &self,
        conn: ConnectionId,
        location: Location,
    ) -> Result<(), WorldError> {
        self.sender
            .send(WorldCommand::SetLocation { conn, location })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Records a production for `conn` on the named channel and wires a
    /// consumption into every other member. Replacing an existing
    /// production for the same channel closes every consumption derived
    /// from the old handle before creating the new ones; no stale
    /// consumer survives this call.
    pub async fn set_production(
        &self,
        conn: ConnectionId,
        channel: String,
        production: M::Production,
    ) -> Result<(), WorldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorldCommand::SetProduction {
                conn,
                channel,
                production,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Number of peers currently in the world.
    pub async fn peer_count(&self) -> Result<usize, WorldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(WorldCommand::PeerCount { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Force-stops the world, closing all media handles. Used by
    /// [`WorldRegistry::remove`](crate::WorldRegistry::remove).
    pub(crate) async fn shutdown(&self) -> Result<(), WorldError> {
        self.sender
            .send(WorldCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

/// The internal world actor state. Runs inside a Tokio task.
struct WorldActor<M: MediaSystem> {
    key: Arc<str>,
    /// Registry generation, so a stale self-removal can never evict a
    /// newer world reusing the same key.
    epoch: u64,
    media: Arc<M>,
    registry: RegistryRef<M>,
    ids: IdAllocator,
    peers: HashMap<PeerId, Peer<M>>,
    receiver: mpsc::Receiver<WorldCommand<M>>,
}

impl<M: MediaSystem> WorldActor<M> {
    /// Runs the actor loop until the world empties or is shut down.
    async fn run(mut self) {
        tracing::info!(world = %self.key, "world opened");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                WorldCommand::Join {
                    conn,
                    sender,
                    data,
                    productions,
                    reply,
                } => {
                    let result = self.handle_join(conn, sender, data, productions).await;
                    let _ = reply.send(result);
                }
                WorldCommand::Leave { conn, reply } => {
                    let emptied = self.handle_leave(conn).await;
                    let _ = reply.send(());
                    if emptied {
                        break;
                    }
                }
                WorldCommand::Chat { conn, text } => self.handle_chat(conn, text),
                WorldCommand::SetState { conn, key, value } => {
                    self.handle_set_state(conn, key, value);
                }
                WorldCommand::SendEvent { conn, data } => self.handle_send_event(conn, data),
                WorldCommand::SetLocation { conn, location } => {
                    self.handle_set_location(conn, location);
                }
                WorldCommand::SetProduction {
                    conn,
                    channel,
                    production,
                    reply,
                } => {
                    self.handle_set_production(conn, channel, production).await;
                    let _ = reply.send(());
                }
                WorldCommand::PeerCount { reply } => {
                    let _ = reply.send(self.peers.len());
                }
                WorldCommand::Shutdown => {
                    self.teardown().await;
                    break;
                }
            }
        }

        tracing::info!(world = %self.key, "world closed");
    }

    /// Resolves the current id of a connection by scanning the peer map —
    /// membership is looked up, never stored as a back-pointer.
    fn find_peer(&self, conn: ConnectionId) -> Option<PeerId> {
        self.peers
            .iter()
            .find(|(_, peer)| peer.conn() == conn)
            .map(|(id, _)| *id)
    }

    /// Queues `msg` to every member except `exclude`.
    fn fan_out(&self, msg: from_host::Msg, exclude: PeerId) {
        for (id, peer) in &self.peers {
            if *id != exclude {
                peer.send(msg.clone());
            }
        }
    }

    /// Queues a broadcast event to every member except `exclude`.
    fn broadcast(&self, event: world_event::Event, exclude: PeerId) {
        self.fan_out(event_message(event), exclude);
    }

    async fn handle_join(
        &mut self,
        conn: ConnectionId,
        sender: PeerSender,
        data: HashMap<String, String>,
        productions: HashMap<String, M::Production>,
    ) -> Result<PeerId, WorldError> {
        let Some(id) = self.ids.allocate() else {
            tracing::warn!(world = %self.key, %conn, "join rejected, no free peer ids");
            // Reject without touching the peer set; the opened production
            // handles still need to be released.
            for (_, production) in productions {
                self.media.close_production(production).await;
            }
            return Err(WorldError::WorldFull(self.key.to_string()));
        };

        let announce = PeerJoined {
            peer_id: id.to_wire(),
            data: data.clone(),
        };
        self.peers
            .insert(id, Peer::new(conn, sender, data, productions));

        // Existing members learn about the newcomer; the newcomer is
        // excluded and learns its id from the join reply instead.
        self.broadcast(world_event::Event::PeerJoined(announce), id);

        // One PeerJoined per existing member to the newcomer, computed
        // from the post-insert peer set, so the roster it rebuilds cannot
        // miss a concurrent join.
        let roster: Vec<from_host::Msg> = self
            .peers
            .iter()
            .filter(|(other_id, _)| **other_id != id)
            .map(|(other_id, other)| {
                event_message(world_event::Event::PeerJoined(PeerJoined {
                    peer_id: other_id.to_wire(),
                    data: other.data().clone(),
                }))
            })
            .collect();
        if let Some(newcomer) = self.peers.get(&id) {
            for msg in roster {
                newcomer.send(msg);
            }
        }

        // Media wiring. The newcomer pulls every existing production, and
        // every existing member pulls the newcomer's. A failed edge is
        // logged and skipped — a peer without media is still a peer.
        let other_ids: Vec<PeerId> = self.peers.keys().copied().filter(|p| *p != id).collect();
        for other_id in &other_ids {
            let theirs = self
                .peers
                .get(other_id)
                .map(|p| p.productions_cloned())
                .unwrap_or_default();
            for (channel, production) in theirs {
                self.wire_consumption(id, *other_id, channel, &production).await;
            }
        }

        let ours = self
            .peers
            .get(&id)
            .map(|p| p.productions_cloned())
            .unwrap_or_default();
        for other_id in &other_ids {
            for (channel, production) in &ours {
                self.wire_consumption(*other_id, id, channel.clone(), production)
                    .await;
            }
        }

        tracing::info!(
            world = %self.key,
            peer = %id,
            peers = self.peers.len(),
            "peer joined"
        );
        Ok(id)
    }

    /// Creates one consumption edge: `receiver` consumes `origin`'s
    /// production on `channel`. Failures degrade to a missing edge.
    async fn wire_consumption(
        &mut self,
        receiver: PeerId,
        origin: PeerId,
        channel: String,
        production: &M::Production,
    ) {
        let Some(receiver_conn) = self.peers.get(&receiver).map(|p| p.conn()) else {
            return;
        };
        match self.media.consume(receiver_conn, production).await {
            Ok(consumption) => {
                if let Some(peer) = self.peers.get_mut(&receiver) {
                    peer.insert_consumption(origin, channel, consumption);
                }
            }
            Err(e) => {
                tracing::warn!(
                    world = %self.key,
                    %receiver,
                    %origin,
                    %channel,
                    error = %e,
                    "media wiring failed, edge skipped"
                );
            }
        }
    }

    /// Runs the leave protocol. Returns `true` when the world emptied and
    /// the actor should stop; deregistration has already happened by then.
    async fn handle_leave(&mut self, conn: ConnectionId) -> bool {
        let Some(id) = self.find_peer(conn) else {
            // Double-leave or a leave racing a failed join.
            tracing::debug!(world = %self.key, %conn, "leave from non-member, ignoring");
            return false;
        };

        // Close every consumption the *other* peers hold on the leaver's
        // productions, exactly once each.
        let other_ids: Vec<PeerId> = self.peers.keys().copied().filter(|p| *p != id).collect();
        for other_id in other_ids {
            let doomed = self
                .peers
                .get(&other_id)
                .map(|p| p.consumption_keys_for(id))
                .unwrap_or_default();
            for key in doomed {
                if let Some(consumption) = self
                    .peers
                    .get_mut(&other_id)
                    .and_then(|p| p.remove_consumption(&key))
                {
                    self.media.close_consumption(consumption).await;
                }
            }
        }

        // Discard the leaver, releasing everything it owns.
        if let Some(mut leaver) = self.peers.remove(&id) {
            for consumption in leaver.drain_consumptions() {
                self.media.close_consumption(consumption).await;
            }
            for production in leaver.drain_productions() {
                self.media.close_production(production).await;
            }
        }
        self.ids.release(id);

        self.broadcast(
            world_event::Event::PeerLeft(PeerLeft {
                peer_id: id.to_wire(),
            }),
            id,
        );

        tracing::info!(
            world = %self.key,
            peer = %id,
            peers = self.peers.len(),
            "peer left"
        );

        if self.peers.is_empty() {
            // Deregistration is part of the leave protocol: by the time
            // the caller sees the leave complete, the registry no longer
            // knows this world.
            self.registry.deregister(&self.key, self.epoch).await;
            return true;
        }
        false
    }

    fn handle_chat(&mut self, conn: ConnectionId, text: String) {
        let Some(id) = self.find_peer(conn) else {
            tracing::debug!(world = %self.key, %conn, "chat from non-member, dropping");
            return;
        };
        self.broadcast(
            world_event::Event::ChatMessage(ChatMessage {
                peer_id: id.to_wire(),
                text,
            }),
            id,
        );
    }

    fn handle_set_state(&mut self, conn: ConnectionId, key: String, value: String) {
        let Some(id) = self.find_peer(conn) else {
            tracing::debug!(world = %self.key, %conn, "state update from non-member, dropping");
            return;
        };
        if let Some(peer) = self.peers.get_mut(&id) {
            peer.set_data(key.clone(), value.clone());
        }
        self.broadcast(
            world_event::Event::StateUpdate(StateUpdate {
                peer_id: id.to_wire(),
                key,
                value,
            }),
            id,
        );
    }

    fn handle_send_event(&mut self, conn: ConnectionId, data: Vec<u8>) {
        let Some(id) = self.find_peer(conn) else {
            tracing::debug!(world = %self.key, %conn, "event from non-member, dropping");
            return;
        };
        self.broadcast(
            world_event::Event::CustomEvent(CustomEvent {
                peer_id: id.to_wire(),
                data,
            }),
            id,
        );
    }

    fn handle_set_location(&mut self, conn: ConnectionId, location: Location) {
        let Some(id) = self.find_peer(conn) else {
            // High-frequency path: arrives constantly around joins and
            // leaves, so a non-member here is completely ordinary.
            return;
        };
        self.fan_out(
            from_host::Msg::PeerLocation(PeerLocation {
                peer_id: id.to_wire(),
                location: Some(location),
            }),
            id,
        );
    }

    async fn handle_set_production(
        &mut self,
        conn: ConnectionId,
        channel: String,
        production: M::Production,
    ) {
        let Some(id) = self.find_peer(conn) else {
            tracing::debug!(world = %self.key, %conn, "production from non-member, dropping");
            // Not recorded anywhere, so release it here.
            self.media.close_production(production).await;
            return;
        };

        // Re-derivation: every consumption derived from the previous
        // production for this channel is closed before the new edges are
        // created, so no consumer of the old handle survives.
        let other_ids: Vec<PeerId> = self.peers.keys().copied().filter(|p| *p != id).collect();
        for other_id in &other_ids {
            if let Some(stale) = self
                .peers
                .get_mut(other_id)
                .and_then(|p| p.remove_consumption(&(id, channel.clone())))
            {
                self.media.close_consumption(stale).await;
            }
        }

        let replaced = self
            .peers
            .get_mut(&id)
            .and_then(|p| p.insert_production(channel.clone(), production.clone()));
        if let Some(old) = replaced {
            self.media.close_production(old).await;
        }

        for other_id in other_ids {
            self.wire_consumption(other_id, id, channel.clone(), &production)
                .await;
        }
    }

    /// Forced teardown: close every media handle and stop. No broadcasts —
    /// the registry entry is already gone and the connection handlers will
    /// notice their channels closing.
    async fn teardown(&mut self) {
        let ids: Vec<PeerId> = self.peers.keys().copied().collect();
        for id in ids {
            if let Some(mut peer) = self.peers.remove(&id) {
                for consumption in peer.drain_consumptions() {
                    self.media.close_consumption(consumption).await;
                }
                for production in peer.drain_productions() {
                    self.media.close_production(production).await;
                }
            }
            self.ids.release(id);
        }
        tracing::info!(world = %self.key, "world shut down");
    }
}

/// Spawns a new world actor task and returns a handle to communicate with
/// it. `channel_size` bounds the command queue — senders wait when it
/// fills.
pub(crate) fn spawn_world<M: MediaSystem>(
    key: &str,
    epoch: u64,
    media: Arc<M>,
    registry: RegistryRef<M>,
    channel_size: usize,
) -> WorldHandle<M> {
    let (tx, rx) = mpsc::channel(channel_size);
    let key: Arc<str> = Arc::from(key);

    let actor = WorldActor {
        key: Arc::clone(&key),
        epoch,
        media,
        registry,
        ids: IdAllocator::new(),
        peers: HashMap::new(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    WorldHandle { key, sender: tx }
}
