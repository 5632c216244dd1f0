//! World lifecycle management for Atrium.
//!
//! A **world** is one isolated multiplayer session: its own membership, its
//! own broadcast scope, its own media fan-out graph. Each world runs as an
//! isolated Tokio task (actor model) that owns the peer map and the id
//! allocator; everything outside talks to it through a [`WorldHandle`].
//!
//! Serializing all mutation through one actor per world is the point of
//! the design: join and leave protocols await external media calls, and
//! none of those suspension points may let a second join/leave interleave
//! on the same world. Worlds are independent of each other — there is no
//! global lock, so one busy world never stalls the rest.
//!
//! # Key types
//!
//! - [`WorldRegistry`] — process-wide map of world key → running world;
//!   creates on first join, forgets a world the instant it empties
//! - [`WorldHandle`] — send operations to a running world actor
//! - [`WorldError`] — the only errors that cross the world boundary

mod error;
mod ids;
mod peer;
mod registry;
mod world;

pub use error::WorldError;
pub use peer::PeerSender;
pub use registry::WorldRegistry;
pub use world::WorldHandle;
