//! Codec trait and implementations for serializing/deserializing values.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The session store and the request helpers don't care HOW values are
//! serialized; they just need something that implements [`Codec`].
//!
//! The API and the browser's local storage both speak JSON, so
//! [`JsonCodec`] is the only implementation.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust values to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between tasks (the session manager is
///   shared with its background revalidation task).
/// - `'static` → the codec owns everything it needs.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Encodes into a `String`, the form string-keyed storage expects.
    fn encode_string<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, ProtocolError> {
        let bytes = self.encode(value)?;
        String::from_utf8(bytes).map_err(|e| {
            ProtocolError::Encode(serde::ser::Error::custom(e.to_string()))
        })
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use futuremesh_protocol::{Codec, JsonCodec, Role};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Role::SuperAdmin).unwrap();
/// assert_eq!(bytes, br#""super_admin""#);
///
/// let decoded: Role = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, Role::SuperAdmin);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, UserId, UserProfile};

    #[test]
    fn test_encode_string_token_is_quoted_json() {
        // Tokens are stored JSON-encoded, the same way the browser's
        // `JSON.stringify` wrote them into local storage.
        let s = JsonCodec.encode_string(&"T1").unwrap();
        assert_eq!(s, "\"T1\"");
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<UserProfile, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_profile_survives_codec() {
        let profile = UserProfile::new(UserId::from(7u64), "hod@campus.edu", Role::Hod);
        let bytes = JsonCodec.encode(&profile).unwrap();
        let back: UserProfile = JsonCodec.decode(&bytes).unwrap();
        assert_eq!(back, profile);
    }
}
