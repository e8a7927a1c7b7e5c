//! Codec trait and implementations for serializing wire messages.
//!
//! The transport layer treats messages as opaque bytes; anything that
//! implements [`Codec`] can produce and consume them. [`JsonCodec`] is
//! the default and what the bundled server speaks.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts between message types and raw bytes.
///
/// `Send + Sync + 'static` because codecs are shared across connection
/// tasks for the life of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] speaking JSON via `serde_json`.
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use cardpit_protocol::{Codec, JsonCodec, Request, RequestKind};
///
/// let codec = JsonCodec;
/// let request = Request { seq: 1, kind: RequestKind::GetLobbyUpdates };
///
/// let bytes = codec.encode(&request).unwrap();
/// let decoded: Request = codec.decode(&bytes).unwrap();
/// assert_eq!(request, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Reply, ServerMsg};

    #[test]
    fn test_decode_rejects_garbage() {
        let err = JsonCodec.decode::<ServerMsg>(b"{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        // Valid JSON, but not a ServerMsg.
        let err = JsonCodec.decode::<ServerMsg>(b"{\"type\":\"Nonsense\"}").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_encode_decode() {
        let msg = ServerMsg::Reply { seq: 3, result: Ok(Reply::Ok) };
        let bytes = JsonCodec.encode(&msg).unwrap();
        let decoded: ServerMsg = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }
}
