//! Core protocol types for Atrium's wire format.
//!
//! Every type here travels on the wire as a protobuf message. The structs
//! carry `prost` field attributes (tag numbers, wire types) and are kept in
//! the shape `prost-build` would generate; tags are append-only — never
//! reuse or renumber a tag, that is what keeps old and new peers
//! compatible.

use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A peer's identity inside one world.
///
/// Room-local and small on purpose: ids live in `[0, 255]`, fit one byte on
/// the wire (a single protobuf varint), and are reassigned after a peer
/// leaves. They mean nothing outside their world.
///
/// On the wire the id rides as a `uint32`; [`PeerId::from_wire`] rejects
/// anything that does not fit back into the byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u8);

impl PeerId {
    /// Converts a decoded wire value back into a peer id.
    ///
    /// Returns `None` for values outside `[0, 255]` — a peer sending those
    /// is speaking a different protocol.
    pub fn from_wire(raw: u32) -> Option<Self> {
        u8::try_from(raw).ok().map(Self)
    }

    /// The id as it is written to the wire.
    pub fn to_wire(self) -> u32 {
        u32::from(self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hex, matching how ids show up in host logs: 0x00..0xff.
        write!(f, "{:#04x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Position quantization factor: 1e-5 granularity.
pub const POSITION_ROUNDING: f32 = 100_000.0;

/// Rotation quantization factor: 1e-4 granularity.
pub const ROTATION_ROUNDING: f32 = 10_000.0;

/// A peer's position and orientation.
///
/// Published client → host at a fixed rate and fanned out to the other
/// members. Always pass through [`Location::quantized`] before sending:
/// full-precision floats are noise past the fifth decimal and quantizing
/// keeps the varint-packed frames small at 10 Hz per peer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Location {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
    #[prost(float, tag = "3")]
    pub z: f32,
    /// Rotation quaternion (x, y, z, w).
    #[prost(float, tag = "4")]
    pub rx: f32,
    #[prost(float, tag = "5")]
    pub ry: f32,
    #[prost(float, tag = "6")]
    pub rz: f32,
    #[prost(float, tag = "7")]
    pub rw: f32,
}

impl Location {
    /// Rounds position to 1e-5 and rotation to 1e-4 granularity.
    pub fn quantized(&self) -> Self {
        fn snap(v: f32, grain: f32) -> f32 {
            (v * grain).round() / grain
        }
        Self {
            x: snap(self.x, POSITION_ROUNDING),
            y: snap(self.y, POSITION_ROUNDING),
            z: snap(self.z, POSITION_ROUNDING),
            rx: snap(self.rx, ROTATION_ROUNDING),
            ry: snap(self.ry, ROTATION_ROUNDING),
            rz: snap(self.rz, ROTATION_ROUNDING),
            rw: snap(self.rw, ROTATION_ROUNDING),
        }
    }
}

// ---------------------------------------------------------------------------
// World events — the broadcast union
// ---------------------------------------------------------------------------

/// A peer entered the world. Sent to every existing member, and once per
/// existing member to the newcomer (so it can rebuild the roster without
/// races).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PeerJoined {
    #[prost(uint32, tag = "1")]
    pub peer_id: u32,
    /// The peer's public key/value data at join time.
    #[prost(map = "string, string", tag = "2")]
    pub data: HashMap<String, String>,
}

/// A peer left the world.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PeerLeft {
    #[prost(uint32, tag = "1")]
    pub peer_id: u32,
}

/// A chat line from a peer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChatMessage {
    #[prost(uint32, tag = "1")]
    pub peer_id: u32,
    #[prost(string, tag = "2")]
    pub text: String,
}

/// One entry of a peer's public data changed.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StateUpdate {
    #[prost(uint32, tag = "1")]
    pub peer_id: u32,
    #[prost(string, tag = "2")]
    pub key: String,
    #[prost(string, tag = "3")]
    pub value: String,
}

/// An application-defined event, opaque to the host.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CustomEvent {
    #[prost(uint32, tag = "1")]
    pub peer_id: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

/// One unit of world-wide state change, delivered to every current member
/// except (for everything but membership changes) the originator.
///
/// Exactly one variant is populated per message — the `oneof` guarantees
/// it. The publish channel for a world is named `world/<key>`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorldEvent {
    #[prost(oneof = "world_event::Event", tags = "1, 2, 3, 4, 5")]
    pub event: Option<world_event::Event>,
}

/// Nested types for [`WorldEvent`].
pub mod world_event {
    /// The populated variant of a [`super::WorldEvent`].
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Event {
        #[prost(message, tag = "1")]
        PeerJoined(super::PeerJoined),
        #[prost(message, tag = "2")]
        PeerLeft(super::PeerLeft),
        #[prost(message, tag = "3")]
        ChatMessage(super::ChatMessage),
        #[prost(message, tag = "4")]
        StateUpdate(super::StateUpdate),
        #[prost(message, tag = "5")]
        CustomEvent(super::CustomEvent),
    }
}

// ---------------------------------------------------------------------------
// Client → host
// ---------------------------------------------------------------------------

/// Request to join a world.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JoinWorld {
    /// Opaque world key. Resolution of keys to hosts belongs to the
    /// application; by the time this message arrives we are the host.
    #[prost(string, tag = "1")]
    pub world: String,
    /// Media channels this peer wants to produce from the start
    /// (e.g. "audio", "data"). May be empty; productions can also be
    /// declared later.
    #[prost(string, repeated, tag = "2")]
    pub channels: Vec<String>,
}

/// Request to leave the current world.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LeaveWorld {}

/// A chat line.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Chat {
    #[prost(string, tag = "1")]
    pub text: String,
}

/// Set one entry of this peer's public data.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetState {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Broadcast an application-defined event.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SendEvent {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

/// Envelope for every client → host message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToHost {
    #[prost(oneof = "to_host::Msg", tags = "1, 2, 3, 4, 5, 6")]
    pub msg: Option<to_host::Msg>,
}

/// Nested types for [`ToHost`].
pub mod to_host {
    /// The populated variant of a [`super::ToHost`].
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "1")]
        JoinWorld(super::JoinWorld),
        #[prost(message, tag = "2")]
        LeaveWorld(super::LeaveWorld),
        #[prost(message, tag = "3")]
        Chat(super::Chat),
        #[prost(message, tag = "4")]
        SetState(super::SetState),
        #[prost(message, tag = "5")]
        SendEvent(super::SendEvent),
        /// High-frequency position channel. Quantize before sending.
        #[prost(message, tag = "6")]
        Location(super::Location),
    }
}

// ---------------------------------------------------------------------------
// Host → client
// ---------------------------------------------------------------------------

/// Join accepted; carries the id the world assigned to you. The broadcast
/// `PeerJoined` deliberately excludes the newcomer, so this ack is the only
/// place a client learns its own id.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WorldJoined {
    #[prost(uint32, tag = "1")]
    pub peer_id: u32,
}

/// Join refused (world at capacity). The client should not retry against
/// the same world.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JoinDenied {
    #[prost(string, tag = "1")]
    pub reason: String,
}

/// Another peer's position, relayed by the host.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PeerLocation {
    #[prost(uint32, tag = "1")]
    pub peer_id: u32,
    #[prost(message, optional, tag = "2")]
    pub location: Option<Location>,
}

/// Envelope for every host → client message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FromHost {
    #[prost(oneof = "from_host::Msg", tags = "1, 2, 3, 4")]
    pub msg: Option<from_host::Msg>,
}

/// Nested types for [`FromHost`].
pub mod from_host {
    /// The populated variant of a [`super::FromHost`].
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "1")]
        WorldJoined(super::WorldJoined),
        #[prost(message, tag = "2")]
        JoinDenied(super::JoinDenied),
        #[prost(message, tag = "3")]
        Event(super::WorldEvent),
        #[prost(message, tag = "4")]
        PeerLocation(super::PeerLocation),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire format is a contract with non-Rust clients, so these tests
    //! pin down the observable encoding behavior, not just round trips.

    use prost::Message;

    use super::*;

    // =====================================================================
    // PeerId
    // =====================================================================

    #[test]
    fn test_peer_id_display_is_hex() {
        assert_eq!(PeerId(0x2a).to_string(), "0x2a");
        assert_eq!(PeerId(0).to_string(), "0x00");
        assert_eq!(PeerId(255).to_string(), "0xff");
    }

    #[test]
    fn test_peer_id_from_wire_accepts_byte_range() {
        assert_eq!(PeerId::from_wire(0), Some(PeerId(0)));
        assert_eq!(PeerId::from_wire(255), Some(PeerId(255)));
    }

    #[test]
    fn test_peer_id_from_wire_rejects_out_of_range() {
        assert_eq!(PeerId::from_wire(256), None);
        assert_eq!(PeerId::from_wire(u32::MAX), None);
    }

    #[test]
    fn test_peer_id_wire_round_trip() {
        let id = PeerId(0x7f);
        assert_eq!(PeerId::from_wire(id.to_wire()), Some(id));
    }

    // =====================================================================
    // Location quantization
    // =====================================================================

    #[test]
    fn test_quantized_position_granularity() {
        let loc = Location {
            x: 1.000004,
            y: -2.000006,
            z: 0.123456789,
            ..Location::default()
        };
        let q = loc.quantized();
        assert_eq!(q.x, 1.0);
        assert_eq!(q.y, -2.00001);
        assert_eq!(q.z, 0.12346);
    }

    #[test]
    fn test_quantized_rotation_granularity() {
        let loc = Location {
            rw: 0.99999999,
            rx: 0.00004,
            ..Location::default()
        };
        let q = loc.quantized();
        assert_eq!(q.rw, 1.0);
        assert_eq!(q.rx, 0.0);
    }

    #[test]
    fn test_quantized_is_idempotent() {
        let loc = Location {
            x: 3.14159265,
            y: -7.7777777,
            z: 100.5,
            rx: 0.1234567,
            ry: 0.7654321,
            rz: -0.0001,
            rw: 0.9999,
        };
        let once = loc.quantized();
        assert_eq!(once, once.quantized());
    }

    // =====================================================================
    // Event union
    // =====================================================================

    #[test]
    fn test_world_event_round_trip_each_variant() {
        let variants = vec![
            world_event::Event::PeerJoined(PeerJoined {
                peer_id: 7,
                data: [("name".to_string(), "ada".to_string())].into(),
            }),
            world_event::Event::PeerLeft(PeerLeft { peer_id: 7 }),
            world_event::Event::ChatMessage(ChatMessage {
                peer_id: 7,
                text: "hello".into(),
            }),
            world_event::Event::StateUpdate(StateUpdate {
                peer_id: 7,
                key: "avatar".into(),
                value: "fox".into(),
            }),
            world_event::Event::CustomEvent(CustomEvent {
                peer_id: 7,
                data: vec![1, 2, 3],
            }),
        ];

        for event in variants {
            let msg = WorldEvent {
                event: Some(event.clone()),
            };
            let bytes = msg.encode_to_vec();
            let decoded = WorldEvent::decode(bytes.as_slice()).unwrap();
            assert_eq!(decoded.event, Some(event));
        }
    }

    #[test]
    fn test_world_event_peer_left_stays_tiny_on_wire() {
        // Ids are capped at 255 so even the largest PeerLeft is a handful
        // of bytes: oneof tag, nested length, field tag, id varint.
        let msg = WorldEvent {
            event: Some(world_event::Event::PeerLeft(PeerLeft { peer_id: 255 })),
        };
        let bytes = msg.encode_to_vec();
        assert!(bytes.len() <= 6, "encoding too large: {} bytes", bytes.len());
    }

    #[test]
    fn test_decode_skips_unknown_fields() {
        // A newer host may append fields we do not know. Protobuf decoders
        // must skip them: encode a ChatMessage, then splice in an unknown
        // varint field with tag 15, and decode again.
        let msg = ChatMessage {
            peer_id: 5,
            text: "hi".into(),
        };
        let mut bytes = msg.encode_to_vec();
        bytes.extend_from_slice(&[0x78, 0x01]); // field 15, varint, value 1

        let decoded = ChatMessage::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"\xff\xff\xff\xff not protobuf";
        assert!(WorldEvent::decode(garbage.as_slice()).is_err());
    }

    // =====================================================================
    // Envelopes
    // =====================================================================

    #[test]
    fn test_to_host_round_trip() {
        let msg = ToHost {
            msg: Some(to_host::Msg::JoinWorld(JoinWorld {
                world: "wss://example/world-1".into(),
                channels: vec!["audio".into(), "data".into()],
            })),
        };
        let bytes = msg.encode_to_vec();
        let decoded = ToHost::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_from_host_location_round_trip() {
        let msg = FromHost {
            msg: Some(from_host::Msg::PeerLocation(PeerLocation {
                peer_id: 9,
                location: Some(Location {
                    x: 1.5,
                    y: 2.0,
                    z: -3.25,
                    rw: 1.0,
                    ..Location::default()
                }),
            })),
        };
        let bytes = msg.encode_to_vec();
        let decoded = FromHost::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_empty_envelope_decodes_to_none() {
        // Zero bytes is a valid (empty) protobuf message — the oneof is
        // simply absent. The codec layer turns this into an error.
        let decoded = ToHost::decode(&[][..]).unwrap();
        assert!(decoded.msg.is_none());
    }
}
