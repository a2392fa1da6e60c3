/// Errors that can occur in the transport layer.
///
/// Note what is NOT here: HTTP error statuses. A 401 or a 500 is a
/// successful round-trip as far as the transport is concerned.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never got a response (DNS, refused, reset, TLS...).
    #[error("network error: {0}")]
    Network(String),

    /// The request couldn't be built (bad URL, bad header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Serializing a request body failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The real-time link is closed.
    #[error("link closed: {0}")]
    Closed(String),
}
