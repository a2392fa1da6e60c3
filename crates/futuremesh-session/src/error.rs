//! Error types for the session layer.

use futuremesh_protocol::ProtocolError;
use futuremesh_transport::TransportError;

/// Errors that can occur during session management.
///
/// Every failure the session layer reports ends up in one of two places:
/// a message shown to the user, or a forced logout. Nothing here is
/// retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The request never got a response: DNS failure, refused
    /// connection, broken body. For verification this counts the same
    /// as a rejected token.
    #[error("network error: {0}")]
    Network(String),

    /// Bad credentials, or a token the server no longer accepts.
    /// Carries the server's `error` message when it sent one.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// An authenticated call came back 401. The session has already been
    /// torn down by the time the caller sees this.
    #[error("session is no longer valid, please log in again")]
    Unauthorized,

    /// Any other non-success response.
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },

    /// The operation needs a token and there isn't one.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The durable store could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// A request body couldn't be encoded or a response couldn't be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A logout (or a newer login) happened while this call was in
    /// flight, so its result was discarded.
    #[error("session changed while the request was in flight")]
    Superseded,
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Encode(e) => SessionError::Protocol(ProtocolError::Encode(e)),
            other => SessionError::Network(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_network_maps_to_network() {
        let err: SessionError = TransportError::Network("connection refused".into()).into();
        assert!(matches!(err, SessionError::Network(ref m) if m.contains("connection refused")));
    }

    #[test]
    fn test_from_transport_encode_maps_to_protocol() {
        let json_err = serde_json::from_str::<u8>("nope").unwrap_err();
        let err: SessionError = TransportError::Encode(json_err).into();
        assert!(matches!(err, SessionError::Protocol(ProtocolError::Encode(_))));
    }

    #[test]
    fn test_rejected_display_includes_status() {
        let err = SessionError::Rejected {
            status: 400,
            message: "Profile update failed".into(),
        };
        assert_eq!(err.to_string(), "Profile update failed (status 400)");
    }
}
