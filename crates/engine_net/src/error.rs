//! Network-layer error types.

/// Errors that can occur on a single connection.
///
/// None of these are fatal to the whole process on the server: the owning
/// router drops the affected connection and keeps running. "No data yet" is
/// not an error at all; see [`FramedStream::try_receive`](crate::FramedStream::try_receive).
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Unexpected I/O failure on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream cleanly (zero-length read).
    #[error("remote peer disconnected")]
    Disconnected,

    /// The peer reset or aborted the connection.
    #[error("remote peer reset the connection")]
    ConnectionReset,

    /// The length prefix was not a fixed-width decimal number. The stream is
    /// out of sync and cannot be recovered.
    #[error("invalid frame header {0:?}")]
    InvalidHeader(String),

    /// The payload length cannot be represented in the frame header.
    #[error("payload of {len} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge {
        /// Encoded payload length.
        len: usize,
        /// Largest length the header can carry.
        max: usize,
    },

    /// Deflate or inflate of a frame payload failed.
    #[error("compression error: {0}")]
    Compression(std::io::Error),

    /// Failed to encode an update batch to JSON.
    #[error("failed to encode batch: {0}")]
    Encode(#[source] serde_json::Error),

    /// Failed to decode an update batch from JSON.
    #[error("failed to decode batch: {0}")]
    Decode(#[source] serde_json::Error),

    /// The connection handshake was malformed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The peer did not complete the handshake in time.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// The peer stopped reading and a write could not finish in time.
    #[error("send timed out after {0:?}")]
    SendTimeout(std::time::Duration),
}

impl NetError {
    /// Returns `true` if the peer went away, cleanly or by reset.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::ConnectionReset)
    }
}

/// An update operation that violates the replication protocol contract.
///
/// These are raised at enqueue time and never reach the wire. They signal a
/// caller bug, not a network condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The update type is not one of `create`, `update` or `delete`.
    #[error("update type {0:?} is invalid")]
    InvalidUpdateType(String),

    /// The op is missing a required field or carries a forbidden one.
    #[error("malformed update for entity {entity_id:?}: {reason}")]
    MalformedUpdate {
        /// The entity the op targets.
        entity_id: String,
        /// What is wrong with it.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_grouping() {
        assert!(NetError::Disconnected.is_disconnect());
        assert!(NetError::ConnectionReset.is_disconnect());
        assert!(!NetError::InvalidHeader("abc".into()).is_disconnect());
        assert!(!NetError::HandshakeTimeout.is_disconnect());
        assert!(!NetError::SendTimeout(std::time::Duration::from_millis(5)).is_disconnect());
    }

    #[test]
    fn test_payload_too_large_message() {
        let err = NetError::PayloadTooLarge {
            len: 10_000_000,
            max: 9_999_999,
        };
        assert_eq!(
            err.to_string(),
            "payload of 10000000 bytes exceeds the 9999999 byte frame limit"
        );
    }
}
