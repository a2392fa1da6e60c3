//! Unified error type for the FutureMesh client.

use futuremesh_notify::NotifyError;
use futuremesh_protocol::ProtocolError;
use futuremesh_session::SessionError;
use futuremesh_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `futuremesh` crate you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum FutureMeshError {
    /// A transport-level error (unreachable server, closed link).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (malformed body, unknown role).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (rejected credentials, expired token).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A notification error.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// The client configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading a local input file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A local input file isn't valid JSON.
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
}
