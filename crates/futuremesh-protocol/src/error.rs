//! Error types for the protocol layer.
//!
//! Each crate in the workspace defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in the shape of the data
//! (serialization, an unknown role name), not in networking or storage.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: a malformed response body, a missing `user` or
    /// `access_token` field, or a role name we don't know.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A role name outside the six known roles.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}
