//! Error types for the notification layer.

use futuremesh_protocol::ProtocolError;
use futuremesh_session::SessionError;

/// Errors that can occur while fetching or updating notifications.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The session refused the call: not signed in, a 401 that ended the
    /// session, or the server couldn't be reached.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server answered with a non-success status other than 401.
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },

    /// The response body wasn't a notification list.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
