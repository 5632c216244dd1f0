//! Error types for the protocol layer.

/// Errors that can occur while decoding wire messages.
///
/// Encoding cannot fail — protobuf serialization of a well-formed struct
/// is infallible — so only the receive path carries errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The bytes are not a valid message (truncated frame, wrong wire
    /// types, malformed varint).
    #[error("decode failed: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The envelope decoded fine but no variant was populated. A correct
    /// sender always fills the union; an empty envelope is either a buggy
    /// client or a variant newer than this build understands.
    #[error("message envelope is empty or unrecognized")]
    EmptyEnvelope,
}
