//! Transport abstraction layer for the FutureMesh client.
//!
//! Provides the [`HttpClient`] and [`RealtimeLink`] traits that abstract over
//! how the client reaches the server, so the session layer can be driven by
//! a real HTTP stack in production and by a scripted fake in tests.
//!
//! # Feature Flags
//!
//! - `http` (default): [`ReqwestClient`], an `HttpClient` backed by `reqwest`
//! - `websocket` (default): [`WebSocketLink`], a real-time link via `tokio-tungstenite`

mod error;
#[cfg(feature = "http")]
mod http;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "http")]
pub use http::ReqwestClient;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketLink;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

/// An outgoing HTTP request.
///
/// Headers are kept as an ordered list rather than a map; [`header`](Self::header)
/// replaces an existing header of the same name (case-insensitively), so
/// there is at most one value per name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    /// Sets a header, replacing any existing value with the same name.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Sets a header only if the request doesn't carry one of that name yet.
    pub fn header_if_absent(self, name: &str, value: impl Into<String>) -> Self {
        if self.has_header(name) {
            self
        } else {
            self.header(name, value)
        }
    }

    /// Serializes `body` as JSON and sets `Content-Type: application/json`.
    ///
    /// # Errors
    /// Returns [`TransportError::Encode`] if the value can't be serialized.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, TransportError> {
        let bytes = serde_json::to_vec(body).map_err(TransportError::Encode)?;
        self.body = Some(bytes);
        Ok(self.header("Content-Type", "application/json"))
    }

    /// Sets a raw body.
    pub fn body(mut self, bytes: Vec<u8>) -> Self {
        self.body = Some(bytes);
        self
    }

    /// Looks up a header value by name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header_value(name).is_some()
    }
}

/// A received HTTP response: the status code and the full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `true` for 401, the status that invalidates a session.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ---------------------------------------------------------------------------
// HttpClient
// ---------------------------------------------------------------------------

/// Sends HTTP requests.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one client is shared by the session manager
///   and its background tasks for the life of the process.
/// - The returned future is `Send` so calls can run inside `tokio::spawn`.
///
/// Only transport-level failures (DNS, refused connection, broken body)
/// are errors. A 4xx/5xx is still `Ok(HttpResponse)`; deciding what a
/// status means is the caller's job.
pub trait HttpClient: Send + Sync + 'static {
    /// Sends `request` and waits for the full response.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Sharing a client through an `Arc` is still a client.
impl<C: HttpClient> HttpClient for Arc<C> {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        (**self).send(request)
    }
}

// ---------------------------------------------------------------------------
// Real-time link
// ---------------------------------------------------------------------------

/// Opaque identifier for a real-time link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

impl LinkId {
    /// Creates a new `LinkId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// A live real-time connection held on behalf of the signed-in user.
///
/// The session manager keeps at most one and tears it down on logout.
/// `disconnect` is synchronous so logout can run from any context
/// (including a 401 handler) without awaiting.
pub trait RealtimeLink: Send + Sync + 'static {
    /// Returns the unique identifier for this link.
    fn id(&self) -> LinkId;

    /// Closes the link. Calling it again is a no-op.
    fn disconnect(&self);

    /// Whether the link is still open.
    fn is_connected(&self) -> bool;
}
