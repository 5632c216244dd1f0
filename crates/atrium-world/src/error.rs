//! Error types for the world layer.

/// Errors that can cross the world boundary.
///
/// Deliberately short: operations from a connection that is not a member
/// are dropped silently (ordinary connect/disconnect races, nothing the
/// caller can act on), and media wiring failures are absorbed inside the
/// actor. What remains is capacity and lifetime.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The world already holds the full 256 peers; the join was rejected
    /// and nothing was mutated.
    #[error("world {0} has no free peer ids")]
    WorldFull(String),

    /// The world actor is gone — the caller raced a teardown. Retry via
    /// [`WorldRegistry::get_or_create`](crate::WorldRegistry::get_or_create).
    #[error("world {0} is unavailable")]
    Unavailable(String),
}
