//! End-to-end tests: a real host, real WebSocket clients, protobuf frames
//! on the wire.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use atrium::HostServer;
use atrium_client::{SessionConfig, WorldDelegate, WorldSession};
use atrium_media::NullMedia;
use atrium_protocol::{
    decode_from_host, encode_to_host, from_host, to_host, world_event, Chat, JoinWorld, LeaveWorld,
    Location, PeerId,
};
use atrium_transport::{ClientWebSocketConnection, Connection, Connector, WebSocketConnector};
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a host on an ephemeral port and returns its ws:// url.
async fn start_host() -> String {
    let server = HostServer::<NullMedia>::builder()
        .bind("127.0.0.1:0")
        .build(NullMedia)
        .await
        .expect("host should bind");
    let addr = server.local_addr().expect("should have local addr");
    tokio::spawn(server.run());
    format!("ws://{addr}")
}

/// A raw protocol client: dial, join, exchange frames.
struct TestClient {
    conn: ClientWebSocketConnection,
}

impl TestClient {
    async fn join(url: &str, world: &str) -> (Self, PeerId) {
        let conn = WebSocketConnector
            .connect(url)
            .await
            .expect("client should connect");
        let client = Self { conn };
        client
            .send(to_host::Msg::JoinWorld(JoinWorld {
                world: world.to_string(),
                channels: Vec::new(),
            }))
            .await;
        let id = match client.next().await {
            from_host::Msg::WorldJoined(joined) => {
                PeerId::from_wire(joined.peer_id).expect("id should fit one byte")
            }
            other => panic!("expected WorldJoined first, got {other:?}"),
        };
        (client, id)
    }

    async fn send(&self, msg: to_host::Msg) {
        self.conn
            .send(&encode_to_host(msg))
            .await
            .expect("send should succeed");
    }

    async fn next(&self) -> from_host::Msg {
        let frame = timeout(RECV_TIMEOUT, self.conn.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("recv should succeed")
            .expect("connection closed unexpectedly");
        decode_from_host(&frame).expect("host frames should decode")
    }

    /// Next broadcast event, skipping location relays and acks.
    async fn next_event(&self) -> world_event::Event {
        loop {
            if let from_host::Msg::Event(envelope) = self.next().await {
                if let Some(event) = envelope.event {
                    return event;
                }
            }
        }
    }

    async fn expect_silence(&self, window: Duration) {
        if let Ok(frame) = timeout(window, self.conn.recv()).await {
            panic!("expected silence, got {frame:?}");
        }
    }
}

// =========================================================================
// Raw protocol round trips
// =========================================================================

#[tokio::test]
async fn test_join_ack_and_membership_announcements() {
    let url = start_host().await;

    let (alice, alice_id) = TestClient::join(&url, "plaza").await;
    let (_bob, bob_id) = TestClient::join(&url, "plaza").await;
    assert_ne!(alice_id, bob_id);

    // Alice learns about Bob exactly once.
    match alice.next_event().await {
        world_event::Event::PeerJoined(joined) => {
            assert_eq!(joined.peer_id, bob_id.to_wire());
        }
        other => panic!("expected PeerJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_newcomer_receives_roster() {
    let url = start_host().await;

    let (_alice, alice_id) = TestClient::join(&url, "plaza").await;
    let (_bob, bob_id) = TestClient::join(&url, "plaza").await;
    let (carol, _carol_id) = TestClient::join(&url, "plaza").await;

    let mut roster = vec![];
    for _ in 0..2 {
        match carol.next_event().await {
            world_event::Event::PeerJoined(joined) => roster.push(joined.peer_id),
            other => panic!("expected roster PeerJoined, got {other:?}"),
        }
    }
    roster.sort_unstable();
    let mut expected = vec![alice_id.to_wire(), bob_id.to_wire()];
    expected.sort_unstable();
    assert_eq!(roster, expected);
}

#[tokio::test]
async fn test_chat_routes_to_others_but_never_the_sender() {
    let url = start_host().await;

    let (alice, alice_id) = TestClient::join(&url, "plaza").await;
    let (bob, _bob_id) = TestClient::join(&url, "plaza").await;
    alice.next_event().await; // Bob's announcement
    bob.next_event().await; // Alice's roster entry

    alice
        .send(to_host::Msg::Chat(Chat { text: "gm".into() }))
        .await;

    match bob.next_event().await {
        world_event::Event::ChatMessage(chat) => {
            assert_eq!(chat.peer_id, alice_id.to_wire());
            assert_eq!(chat.text, "gm");
        }
        other => panic!("expected ChatMessage, got {other:?}"),
    }

    alice.expect_silence(Duration::from_millis(250)).await;
}

#[tokio::test]
async fn test_explicit_leave_notifies_remaining_members() {
    let url = start_host().await;

    let (alice, _alice_id) = TestClient::join(&url, "plaza").await;
    let (bob, bob_id) = TestClient::join(&url, "plaza").await;
    alice.next_event().await;

    bob.send(to_host::Msg::LeaveWorld(LeaveWorld {})).await;

    match alice.next_event().await {
        world_event::Event::PeerLeft(left) => {
            assert_eq!(left.peer_id, bob_id.to_wire());
        }
        other => panic!("expected PeerLeft, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dropped_connection_runs_the_leave_protocol() {
    let url = start_host().await;

    let (alice, _alice_id) = TestClient::join(&url, "plaza").await;
    let (bob, bob_id) = TestClient::join(&url, "plaza").await;
    alice.next_event().await;

    // No LeaveWorld message — the socket just goes away.
    bob.conn.close().await.expect("close should succeed");

    match alice.next_event().await {
        world_event::Event::PeerLeft(left) => {
            assert_eq!(left.peer_id, bob_id.to_wire());
        }
        other => panic!("expected PeerLeft, got {other:?}"),
    }
}

#[tokio::test]
async fn test_worlds_are_isolated() {
    let url = start_host().await;

    let (alice, _) = TestClient::join(&url, "plaza").await;
    let (bob, _) = TestClient::join(&url, "library").await;

    alice
        .send(to_host::Msg::Chat(Chat { text: "anyone?".into() }))
        .await;

    bob.expect_silence(Duration::from_millis(250)).await;
}

#[tokio::test]
async fn test_location_updates_are_relayed_to_other_members() {
    let url = start_host().await;

    let (alice, alice_id) = TestClient::join(&url, "plaza").await;
    let (bob, _bob_id) = TestClient::join(&url, "plaza").await;
    alice.next_event().await;

    alice
        .send(to_host::Msg::Location(Location {
            x: 1.5,
            y: 0.0,
            z: -2.25,
            rw: 1.0,
            ..Location::default()
        }))
        .await;

    loop {
        match bob.next().await {
            from_host::Msg::PeerLocation(update) => {
                assert_eq!(update.peer_id, alice_id.to_wire());
                let location = update.location.expect("location should be set");
                assert_eq!(location.x, 1.5);
                assert_eq!(location.z, -2.25);
                break;
            }
            from_host::Msg::Event(_) => continue,
            other => panic!("expected PeerLocation, got {other:?}"),
        }
    }
}

// =========================================================================
// Full client stack against the host
// =========================================================================

#[derive(Clone, Default)]
struct SceneLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl SceneLog {
    fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    fn snapshot(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    async fn wait_for(&self, needle: &str) {
        for _ in 0..200 {
            if self.snapshot().iter().any(|e| e.contains(needle)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for {needle:?}, log = {:?}",
            self.snapshot()
        );
    }
}

impl WorldDelegate for SceneLog {
    fn joined(&self, own_id: PeerId) {
        self.push(format!("joined as {own_id}"));
    }
    fn peer_joined(&self, id: PeerId, _data: &std::collections::HashMap<String, String>) {
        self.push(format!("peer_joined {id}"));
    }
    fn peer_left(&self, id: PeerId) {
        self.push(format!("peer_left {id}"));
    }
    fn chat(&self, id: PeerId, text: &str) {
        self.push(format!("chat {id}: {text}"));
    }
}

#[tokio::test]
async fn test_world_session_full_round_trip() {
    let url = start_host().await;
    let scene = SceneLog::default();

    let session = WorldSession::connect(
        WebSocketConnector,
        scene.clone(),
        url.clone(),
        "plaza",
        SessionConfig::default(),
    );
    scene.wait_for("joined as").await;

    // A raw peer joins; both sides see each other.
    let (raw, raw_id) = TestClient::join(&url, "plaza").await;
    scene.wait_for(&format!("peer_joined {raw_id}")).await;
    raw.next_event().await; // roster announcement for the session peer

    // Chat in both directions.
    raw.send(to_host::Msg::Chat(Chat {
        text: "hello session".into(),
    }))
    .await;
    scene.wait_for("hello session").await;

    session.chat("hello raw").unwrap();
    match raw.next_event().await {
        world_event::Event::ChatMessage(chat) => {
            assert_eq!(chat.text, "hello raw");
        }
        other => panic!("expected ChatMessage, got {other:?}"),
    }

    // The session leaves; the raw peer hears about it.
    session.leave_world();
    session.until_closed().await.expect("clean close");
    match raw.next_event().await {
        world_event::Event::PeerLeft(_) => {}
        other => panic!("expected PeerLeft, got {other:?}"),
    }
}
