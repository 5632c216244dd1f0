//! Per-connection handler: decode frames, route them into the world layer.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Loop: receive frames → decode → route
//!   2. `JoinWorld` → open declared productions, join via the registry,
//!      ack with `WorldJoined`, start the outbound pump
//!   3. Everything else routes to the current world (or is dropped)
//!   4. On close — clean or not — the peer leaves its world

use std::collections::HashMap;
use std::sync::Arc;

use atrium_media::MediaSystem;
use atrium_protocol::{
    decode_to_host, encode_from_host, from_host, to_host, JoinDenied, PeerId, WorldJoined,
};
use atrium_transport::{Connection, ConnectionId, ServerWebSocketConnection};
use atrium_world::{WorldError, WorldHandle};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::AtriumError;

/// Drop guard that removes the peer from its world when the handler exits.
///
/// This ensures the leave protocol runs even if the handler panics. Since
/// `Drop` is synchronous, the leave is spawned fire-and-forget; a
/// double-leave is a no-op, so racing the explicit path is harmless.
struct WorldGuard<M: MediaSystem> {
    conn: ConnectionId,
    world: Option<WorldHandle<M>>,
}

impl<M: MediaSystem> WorldGuard<M> {
    fn arm(&mut self, world: WorldHandle<M>) {
        self.world = Some(world);
    }

    fn disarm(&mut self) -> Option<WorldHandle<M>> {
        self.world.take()
    }

    fn current(&self) -> Option<&WorldHandle<M>> {
        self.world.as_ref()
    }
}

impl<M: MediaSystem> Drop for WorldGuard<M> {
    fn drop(&mut self) {
        if let Some(world) = self.world.take() {
            let conn = self.conn;
            tokio::spawn(async move {
                let _ = world.leave(conn).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<M: MediaSystem>(
    conn: ServerWebSocketConnection,
    state: Arc<ServerState<M>>,
) -> Result<(), AtriumError> {
    let conn_id = conn.id();
    let conn = Arc::new(conn);
    tracing::debug!(%conn_id, "handling new connection");

    let mut guard = WorldGuard {
        conn: conn_id,
        world: None,
    };

    loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "receive error");
                break;
            }
        };

        let msg = match decode_to_host(&frame) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "undecodable frame, skipping");
                continue;
            }
        };

        match msg {
            to_host::Msg::JoinWorld(join) => {
                if guard.current().is_some() {
                    tracing::debug!(%conn_id, "join while already in a world, ignoring");
                    continue;
                }
                match join_world(&state, conn_id, &join.world, &join.channels).await {
                    JoinOutcome::Joined {
                        world,
                        peer_id,
                        events,
                    } => {
                        send(
                            &conn,
                            from_host::Msg::WorldJoined(WorldJoined {
                                peer_id: peer_id.to_wire(),
                            }),
                        )
                        .await?;
                        guard.arm(world);
                        tokio::spawn(pump_events(events, Arc::clone(&conn)));
                    }
                    JoinOutcome::Full => {
                        send(
                            &conn,
                            from_host::Msg::JoinDenied(JoinDenied {
                                reason: "world is full".into(),
                            }),
                        )
                        .await?;
                    }
                }
            }

            to_host::Msg::LeaveWorld(_) => {
                if let Some(world) = guard.disarm() {
                    let _ = world.leave(conn_id).await;
                }
                // The pump ends on its own once the world drops the
                // peer's sender.
            }

            to_host::Msg::Chat(chat) => {
                if let Some(world) = guard.current() {
                    let _ = world.chat(conn_id, chat.text).await;
                } else {
                    tracing::debug!(%conn_id, "chat before joining a world, dropping");
                }
            }

            to_host::Msg::SetState(update) => {
                if let Some(world) = guard.current() {
                    let _ = world.set_state(conn_id, update.key, update.value).await;
                }
            }

            to_host::Msg::SendEvent(event) => {
                if let Some(world) = guard.current() {
                    let _ = world.send_event(conn_id, event.data).await;
                }
            }

            to_host::Msg::Location(location) => {
                if let Some(world) = guard.current() {
                    let _ = world.set_location(conn_id, location).await;
                }
            }
        }
    }

    // Normal-path leave; the guard only fires if this was skipped.
    if let Some(world) = guard.disarm() {
        let _ = world.leave(conn_id).await;
    }
    Ok(())
}

enum JoinOutcome<M: MediaSystem> {
    Joined {
        world: WorldHandle<M>,
        peer_id: PeerId,
        events: mpsc::UnboundedReceiver<from_host::Msg>,
    },
    Full,
}

/// Opens the declared productions, then joins through the registry.
///
/// An `Unavailable` means the lookup raced the world's self-teardown;
/// re-fetching spawns a fresh world, so the loop converges immediately.
async fn join_world<M: MediaSystem>(
    state: &ServerState<M>,
    conn_id: ConnectionId,
    key: &str,
    channels: &[String],
) -> JoinOutcome<M> {
    let media = state.registry.media();
    let mut productions = HashMap::new();
    for channel in channels {
        match media.open_production(conn_id, channel).await {
            Ok(production) => {
                productions.insert(channel.clone(), production);
            }
            Err(e) => {
                tracing::warn!(
                    %conn_id,
                    %channel,
                    error = %e,
                    "could not open production, channel skipped"
                );
            }
        }
    }

    loop {
        let world = state.registry.get_or_create(key).await;
        let (sender, events) = mpsc::unbounded_channel();
        match world
            .join(conn_id, sender, HashMap::new(), productions.clone())
            .await
        {
            Ok(peer_id) => {
                return JoinOutcome::Joined {
                    world,
                    peer_id,
                    events,
                };
            }
            Err(WorldError::WorldFull(_)) => {
                // The world released the handles it was given; ours are
                // clones of the same resources, nothing further to close.
                return JoinOutcome::Full;
            }
            Err(WorldError::Unavailable(_)) => continue,
        }
    }
}

/// Forwards the peer's event channel onto its socket. Ends when the world
/// drops the sender (leave) or the socket breaks.
async fn pump_events(
    mut events: mpsc::UnboundedReceiver<from_host::Msg>,
    conn: Arc<ServerWebSocketConnection>,
) {
    while let Some(msg) = events.recv().await {
        let frame = encode_from_host(msg);
        if conn.send(&frame).await.is_err() {
            break;
        }
    }
}

/// Encodes and sends one host → client message.
async fn send(
    conn: &ServerWebSocketConnection,
    msg: from_host::Msg,
) -> Result<(), AtriumError> {
    let frame = encode_from_host(msg);
    conn.send(&frame).await.map_err(AtriumError::Transport)
}
