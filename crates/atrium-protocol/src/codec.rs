//! Envelope encode/decode helpers.
//!
//! Thin wrappers over `prost` so the rest of the codebase works with the
//! populated `oneof` variants directly instead of `Option`-wrapped
//! envelopes.

use prost::Message;

use crate::types::{from_host, to_host, world_event, FromHost, ToHost, WorldEvent};
use crate::ProtocolError;

/// Encodes a client → host message into a wire frame.
pub fn encode_to_host(msg: to_host::Msg) -> Vec<u8> {
    ToHost { msg: Some(msg) }.encode_to_vec()
}

/// Decodes a client → host wire frame.
///
/// # Errors
/// [`ProtocolError::Decode`] for malformed bytes,
/// [`ProtocolError::EmptyEnvelope`] when no variant is populated (which
/// also covers variants this build does not know — protobuf skips them,
/// leaving the union empty).
pub fn decode_to_host(data: &[u8]) -> Result<to_host::Msg, ProtocolError> {
    ToHost::decode(data)?.msg.ok_or(ProtocolError::EmptyEnvelope)
}

/// Encodes a host → client message into a wire frame.
pub fn encode_from_host(msg: from_host::Msg) -> Vec<u8> {
    FromHost { msg: Some(msg) }.encode_to_vec()
}

/// Decodes a host → client wire frame.
pub fn decode_from_host(data: &[u8]) -> Result<from_host::Msg, ProtocolError> {
    FromHost::decode(data)?.msg.ok_or(ProtocolError::EmptyEnvelope)
}

/// Wraps a broadcast event variant into the host → client envelope.
pub fn event_message(event: world_event::Event) -> from_host::Msg {
    from_host::Msg::Event(WorldEvent { event: Some(event) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chat, PeerLeft};

    #[test]
    fn test_to_host_helper_round_trip() {
        let msg = to_host::Msg::Chat(Chat { text: "gm".into() });
        let bytes = encode_to_host(msg.clone());
        assert_eq!(decode_to_host(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_from_host_helper_round_trip() {
        let msg = event_message(world_event::Event::PeerLeft(PeerLeft { peer_id: 3 }));
        let bytes = encode_from_host(msg.clone());
        assert_eq!(decode_from_host(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_empty_envelope_is_an_error() {
        assert!(matches!(
            decode_to_host(&[]),
            Err(ProtocolError::EmptyEnvelope)
        ));
        assert!(matches!(
            decode_from_host(&[]),
            Err(ProtocolError::EmptyEnvelope)
        ));
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let garbage = [0xff, 0xff, 0xff];
        assert!(matches!(
            decode_to_host(&garbage),
            Err(ProtocolError::Decode(_))
        ));
    }
}
