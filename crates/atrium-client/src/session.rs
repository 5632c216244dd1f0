//! The session driver: one task that owns the connection end to end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use atrium_protocol::{
    decode_from_host, encode_to_host, from_host, to_host, world_event, Chat, JoinWorld, LeaveWorld,
    Location, PeerId, SendEvent, SetState,
};
use atrium_transport::{Connection, Connector, TransportError};
use tokio::sync::{mpsc, watch};

use crate::{ClientError, SessionConfig, SessionState, WorldDelegate};

/// Requests from the handle to the driver task.
enum Command {
    Chat(String),
    SetState(String, String),
    SendEvent(Vec<u8>),
}

impl Command {
    fn into_wire(self) -> to_host::Msg {
        match self {
            Self::Chat(text) => to_host::Msg::Chat(Chat { text }),
            Self::SetState(key, value) => to_host::Msg::SetState(SetState { key, value }),
            Self::SendEvent(data) => to_host::Msg::SendEvent(SendEvent { data }),
        }
    }
}

/// State shared between the handle and the driver task.
struct SessionShared {
    state: watch::Sender<SessionState>,
    shutdown: watch::Sender<bool>,
    /// Set while a connection is up. Checked before each reconnection
    /// attempt so a connection that came up out of band (a racing driver
    /// generation) aborts the retry loop instead of fighting it.
    connected: AtomicBool,
}

impl SessionShared {
    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}

/// A connection to one world, driven from the local peer's side.
///
/// Created with [`WorldSession::connect`]; lives until
/// [`leave_world`](Self::leave_world) or until every reconnection attempt
/// is exhausted. Dropping the handle also tears the session down.
pub struct WorldSession {
    shared: Arc<SessionShared>,
    state_rx: watch::Receiver<SessionState>,
    location_tx: watch::Sender<Option<Location>>,
    commands: mpsc::UnboundedSender<Command>,
    max_attempts: u32,
}

impl WorldSession {
    /// Dials `addr`, joins `world`, and spawns the driver task.
    ///
    /// Returns immediately; observe progress through [`state`](Self::state)
    /// or the delegate.
    pub fn connect<C, D>(
        connector: C,
        delegate: D,
        addr: impl Into<String>,
        world: impl Into<String>,
        config: SessionConfig,
    ) -> Self
    where
        C: Connector,
        D: WorldDelegate,
    {
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (location_tx, location_rx) = watch::channel(None);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(SessionShared {
            state: state_tx,
            shutdown: shutdown_tx,
            connected: AtomicBool::new(false),
        });
        let max_attempts = config.max_reconnect_attempts;

        let driver = Driver {
            connector,
            delegate,
            addr: addr.into(),
            world: world.into(),
            config,
            shared: Arc::clone(&shared),
            commands: command_rx,
            shutdown_rx,
            location_rx,
        };
        tokio::spawn(driver.run());

        Self {
            shared,
            state_rx,
            location_tx,
            commands: command_tx,
            max_attempts,
        }
    }

    /// The current session state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Updates the local position. The publish timer sends the latest
    /// value at its fixed rate; calling this more often than the publish
    /// rate just overwrites the pending value.
    pub fn set_location(&self, location: Location) {
        self.location_tx.send_replace(Some(location));
    }

    /// Broadcasts a chat line to the other members.
    pub fn chat(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.send_command(Command::Chat(text.into()))
    }

    /// Sets one entry of this peer's public data.
    pub fn set_state(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send_command(Command::SetState(key.into(), value.into()))
    }

    /// Broadcasts an application-defined event to the other members.
    pub fn send_event(&self, data: Vec<u8>) -> Result<(), ClientError> {
        self.send_command(Command::SendEvent(data))
    }

    /// Leaves the world and tears the session down: stops the publish
    /// timer, cancels any pending reconnection, closes the transport.
    ///
    /// Callable from any state and idempotent.
    pub fn leave_world(&self) {
        self.shared.shutdown.send_replace(true);
        // If the driver is already gone (e.g. Failed), settle the state
        // here; otherwise the driver transitions on its way out.
        if self.commands.is_closed() {
            self.shared.set_state(SessionState::Disconnected);
        }
    }

    /// Resolves when the session permanently ends: `Ok` after a clean
    /// leave, `Err(ReconnectExhausted)` when every retry failed.
    pub async fn until_closed(&self) -> Result<(), ClientError> {
        let mut rx = self.state_rx.clone();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                SessionState::Disconnected => return Ok(()),
                SessionState::Failed => {
                    return Err(ClientError::ReconnectExhausted(self.max_attempts));
                }
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Ok(());
            }
        }
    }

    fn send_command(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::SessionClosed)
    }
}

impl Drop for WorldSession {
    fn drop(&mut self) {
        self.shared.shutdown.send_replace(true);
    }
}

/// Why the joined loop ended.
enum LoopEnd {
    /// `leave_world` or handle dropped — clean exit, no retries.
    Shutdown,
    /// The host refused the join — clean exit, no retries.
    Denied,
    /// The transport dropped — enter the retry loop.
    ConnectionLost,
}

struct Driver<C: Connector, D: WorldDelegate> {
    connector: C,
    delegate: D,
    addr: String,
    world: String,
    config: SessionConfig,
    shared: Arc<SessionShared>,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown_rx: watch::Receiver<bool>,
    location_rx: watch::Receiver<Option<Location>>,
}

impl<C: Connector, D: WorldDelegate> Driver<C, D> {
    async fn run(mut self) {
        let mut attempt: u32 = 0;

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            self.shared.set_state(SessionState::Connecting);
            match connect_and_join(&self.connector, &self.addr, &self.world, &self.config).await {
                Ok(conn) => {
                    self.shared.connected.store(true, Ordering::Relaxed);
                    // Back in the world: the retry counter starts over.
                    attempt = 0;
                    self.shared.set_state(SessionState::Joined);
                    tracing::info!(world = %self.world, "joined world");

                    let end = run_joined(
                        &conn,
                        &self.delegate,
                        &mut self.commands,
                        &mut self.shutdown_rx,
                        &self.location_rx,
                        self.config.publish_interval(),
                    )
                    .await;

                    self.shared.connected.store(false, Ordering::Relaxed);
                    let _ = conn.close().await;

                    match end {
                        LoopEnd::Shutdown | LoopEnd::Denied => break,
                        LoopEnd::ConnectionLost => {
                            tracing::info!(world = %self.world, "disconnected from host");
                            self.delegate.connection_lost();
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(world = %self.world, error = %e, "connect failed");
                }
            }

            attempt += 1;
            if attempt > self.config.max_reconnect_attempts {
                tracing::warn!(
                    world = %self.world,
                    attempts = self.config.max_reconnect_attempts,
                    "giving up on reconnection"
                );
                self.shared.set_state(SessionState::Failed);
                self.delegate.reconnect_exhausted();
                return;
            }

            // Wait a little longer before each attempt.
            self.shared.set_state(SessionState::Reconnecting { attempt });
            let delay = self.config.reconnect_backoff * attempt;
            tracing::info!(world = %self.world, attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_rx.changed() => {}
            }
            if *self.shutdown_rx.borrow() {
                break;
            }
            if self.shared.connected.load(Ordering::Relaxed) {
                // A connection was established out of band while we slept;
                // this loop has nothing left to do.
                break;
            }
        }

        self.shared.set_state(SessionState::Disconnected);
    }
}

/// Dials the host and sends the join request.
async fn connect_and_join<C: Connector>(
    connector: &C,
    addr: &str,
    world: &str,
    config: &SessionConfig,
) -> Result<C::Connection, ClientError> {
    let conn = connector.connect(addr).await?;
    let join = encode_to_host(to_host::Msg::JoinWorld(JoinWorld {
        world: world.to_string(),
        channels: config.channels.clone(),
    }));
    conn.send(&join)
        .await
        .map_err(|e| ClientError::Transport(TransportError::ConnectionClosed(e.to_string())))?;
    Ok(conn)
}

/// The joined loop: receive, publish, relay commands — until the
/// connection drops or the session is told to stop.
async fn run_joined<Conn: Connection, D: WorldDelegate>(
    conn: &Conn,
    delegate: &D,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    shutdown_rx: &mut watch::Receiver<bool>,
    location_rx: &watch::Receiver<Option<Location>>,
    publish_interval: Option<Duration>,
) -> LoopEnd {
    let mut publish = publish_interval.map(|interval| {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        timer
    });

    loop {
        tokio::select! {
            received = conn.recv() => {
                match received {
                    Ok(Some(frame)) => {
                        if let Some(end) = dispatch(delegate, &frame) {
                            return end;
                        }
                    }
                    Ok(None) => return LoopEnd::ConnectionLost,
                    Err(e) => {
                        tracing::debug!(error = %e, "receive failed");
                        return LoopEnd::ConnectionLost;
                    }
                }
            }
            _ = next_publish(&mut publish) => {
                let location = location_rx.borrow().clone();
                if let Some(location) = location {
                    let frame =
                        encode_to_host(to_host::Msg::Location(location.quantized()));
                    if conn.send(&frame).await.is_err() {
                        return LoopEnd::ConnectionLost;
                    }
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    // Handle dropped: tear down quietly.
                    return LoopEnd::Shutdown;
                };
                let frame = encode_to_host(command.into_wire());
                if conn.send(&frame).await.is_err() {
                    return LoopEnd::ConnectionLost;
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let leave = encode_to_host(to_host::Msg::LeaveWorld(LeaveWorld {}));
                    let _ = conn.send(&leave).await;
                    return LoopEnd::Shutdown;
                }
            }
        }
    }
}

/// Pends forever when publishing is disabled, so the select just ignores
/// the branch.
async fn next_publish(publish: &mut Option<tokio::time::Interval>) {
    match publish {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Routes one inbound frame to the delegate. Returns `Some` when the
/// session must end.
fn dispatch<D: WorldDelegate>(delegate: &D, frame: &[u8]) -> Option<LoopEnd> {
    let msg = match decode_from_host(frame) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(error = %e, "undecodable frame, skipping");
            return None;
        }
    };

    match msg {
        from_host::Msg::WorldJoined(joined) => {
            if let Some(id) = PeerId::from_wire(joined.peer_id) {
                delegate.joined(id);
            }
        }
        from_host::Msg::JoinDenied(denied) => {
            tracing::warn!(reason = %denied.reason, "join denied by host");
            delegate.join_denied(&denied.reason);
            return Some(LoopEnd::Denied);
        }
        from_host::Msg::PeerLocation(update) => {
            if let (Some(id), Some(location)) =
                (PeerId::from_wire(update.peer_id), update.location)
            {
                delegate.peer_moved(id, &location);
            }
        }
        from_host::Msg::Event(envelope) => {
            if let Some(event) = envelope.event {
                dispatch_event(delegate, event);
            }
        }
    }
    None
}

fn dispatch_event<D: WorldDelegate>(delegate: &D, event: world_event::Event) {
    match event {
        world_event::Event::PeerJoined(joined) => {
            if let Some(id) = PeerId::from_wire(joined.peer_id) {
                delegate.peer_joined(id, &joined.data);
            }
        }
        world_event::Event::PeerLeft(left) => {
            if let Some(id) = PeerId::from_wire(left.peer_id) {
                delegate.peer_left(id);
            }
        }
        world_event::Event::ChatMessage(chat) => {
            if let Some(id) = PeerId::from_wire(chat.peer_id) {
                delegate.chat(id, &chat.text);
            }
        }
        world_event::Event::StateUpdate(update) => {
            if let Some(id) = PeerId::from_wire(update.peer_id) {
                delegate.state_updated(id, &update.key, &update.value);
            }
        }
        world_event::Event::CustomEvent(event) => {
            if let Some(id) = PeerId::from_wire(event.peer_id) {
                delegate.event(id, &event.data);
            }
        }
    }
}
