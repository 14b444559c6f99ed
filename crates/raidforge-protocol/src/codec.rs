//! Codec trait and implementations for turning records into bytes.
//!
//! The file-backed store persists a snapshot of every table through a
//! [`Codec`]. Announcements can go through the same codec when a gateway
//! wants them as bytes.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes serializable values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because codecs live inside long-running stores
/// shared across Tokio tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] on malformed or mismatched input.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`. Snapshots stay human-readable,
/// which makes a stuck raid easy to inspect on disk.
///
/// ```rust
/// use raidforge_protocol::{Codec, JsonCodec, SessionId};
///
/// let bytes = JsonCodec.encode(&SessionId(9)).unwrap();
/// assert_eq!(bytes, b"9");
/// let back: SessionId = JsonCodec.decode(&bytes).unwrap();
/// assert_eq!(back, SessionId(9));
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec_pretty(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Participant, PlayerId, SessionId, Timestamp};

    #[test]
    fn test_json_codec_decodes_what_it_encodes() {
        let p = Participant::enrolled(SessionId(2), PlayerId(8), Timestamp(100));
        let bytes = JsonCodec.encode(&p).unwrap();
        let back: Participant = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let result: Result<Participant, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
