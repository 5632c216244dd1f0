//! Wire protocol for Atrium.
//!
//! This crate defines everything that travels between a client and a world
//! host:
//!
//! - **Types** ([`ToHost`], [`FromHost`], [`WorldEvent`], [`PeerId`],
//!   [`Location`]) — the message structures on the wire.
//! - **Codec** ([`codec`]) — helpers for encoding/decoding the envelopes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during decoding.
//!
//! The encoding is protobuf (via `prost`): compact, schema-evolvable, and
//! forward-compatible — a decoder skips fields it does not know, so old
//! hosts and new clients can coexist. The message structs below are written
//! in the exact shape `prost` generates, just maintained by hand since the
//! schema is small.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the world
//! layer (membership). It knows nothing about connections or worlds — it
//! only defines what the bytes mean.

mod codec;
mod error;
mod types;

pub use codec::{decode_from_host, decode_to_host, encode_from_host, encode_to_host, event_message};
pub use error::ProtocolError;
pub use types::{
    Chat, ChatMessage, CustomEvent, FromHost, JoinDenied, JoinWorld, LeaveWorld, Location, PeerId,
    PeerJoined, PeerLeft, PeerLocation, SendEvent, SetState, StateUpdate, ToHost, WorldEvent,
    WorldJoined, from_host, to_host, world_event, POSITION_ROUNDING, ROTATION_ROUNDING,
};
