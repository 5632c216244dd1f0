//! Unified error type for the Atrium host.

use atrium_media::MediaError;
use atrium_protocol::ProtocolError;
use atrium_transport::TransportError;
use atrium_world::WorldError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors
/// automatically, so the host code deals with one error type.
#[derive(Debug, thiserror::Error)]
pub enum AtriumError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (malformed or empty frames).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A world-level error (full, unavailable).
    #[error(transparent)]
    World(#[from] WorldError),

    /// A media subsystem error.
    #[error(transparent)]
    Media(#[from] MediaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let atrium_err: AtriumError = err.into();
        assert!(matches!(atrium_err, AtriumError::Transport(_)));
        assert!(atrium_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::EmptyEnvelope;
        let atrium_err: AtriumError = err.into();
        assert!(matches!(atrium_err, AtriumError::Protocol(_)));
    }

    #[test]
    fn test_from_world_error() {
        let err = WorldError::WorldFull("w1".into());
        let atrium_err: AtriumError = err.into();
        assert!(matches!(atrium_err, AtriumError::World(_)));
        assert!(atrium_err.to_string().contains("w1"));
    }

    #[test]
    fn test_from_media_error() {
        let err = MediaError::Unavailable;
        let atrium_err: AtriumError = err.into();
        assert!(matches!(atrium_err, AtriumError::Media(_)));
    }
}
