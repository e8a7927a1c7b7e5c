//! Unified error type for the Cardpit server.

use cardpit_protocol::ProtocolError;

/// Top-level error for building and running a server.
///
/// Faults a client caused are answered on the wire as `ApiError` replies
/// and never surface here; what remains is infrastructure the embedding
/// process can actually act on.
#[derive(Debug, thiserror::Error)]
pub enum CardpitError {
    /// Socket-level failure: bind or accept.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or frame transport failure.
    #[error(transparent)]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    /// Encoding an outbound wire message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let top: CardpitError = err.into();
        assert!(matches!(top, CardpitError::Io(_)));
        assert!(top.to_string().contains("taken"));
    }

    #[test]
    fn test_from_ws_error() {
        let err = tokio_tungstenite::tungstenite::Error::ConnectionClosed;
        let top: CardpitError = err.into();
        assert!(matches!(top, CardpitError::Ws(_)));
    }

    #[test]
    fn test_from_protocol_error() {
        use cardpit_protocol::{Codec, JsonCodec};
        use std::collections::HashMap;

        // serde_json refuses map keys that are not strings.
        let unkeyable: HashMap<Vec<u8>, u8> = HashMap::from([(vec![1], 2)]);
        let err = JsonCodec
            .encode(&unkeyable)
            .expect_err("bytes cannot key a JSON map");
        let top: CardpitError = err.into();
        assert!(matches!(top, CardpitError::Protocol(_)));
        assert!(top.to_string().contains("encode"));
    }
}
