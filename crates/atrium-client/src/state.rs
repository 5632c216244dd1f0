//! Session lifecycle state machine.

use std::fmt;

/// The observable state of a [`WorldSession`](crate::WorldSession).
///
/// ```text
///             ┌──────────(reconnected)──────────┐
///             ▼                                 │
/// Connecting ──→ Joined ──(transport lost)──→ Reconnecting {1..=max}
///                  │                            │
///            (leave_world)                (attempts exhausted)
///                  ▼                            ▼
///             Disconnected                   Failed
/// ```
///
/// `Disconnected` is terminal-by-choice (the application left);
/// `Failed` is terminal-by-exhaustion (no retry succeeded and no further
/// automatic retries will happen).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection and nothing in flight.
    Disconnected,
    /// Dialing the host and sending the join request.
    Connecting,
    /// Connected and a member of the world; the publish timer runs.
    Joined,
    /// Transport lost; waiting out the backoff before attempt `attempt`.
    Reconnecting {
        /// 1-based attempt number about to be made.
        attempt: u32,
    },
    /// All reconnection attempts exhausted. No automatic retries occur.
    Failed,
}

impl SessionState {
    /// Whether the session is live (connected or actively coming back).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Joined | Self::Reconnecting { .. }
        )
    }

    /// Whether the session has permanently ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Joined => write!(f, "Joined"),
            Self::Reconnecting { attempt } => write!(f, "Reconnecting(attempt {attempt})"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}
