//! # FutureMesh
//!
//! Client library for the FutureMesh campus placement and alumni network.
//!
//! The heart of the crate is the authentication session: a persisted
//! token and profile, a [`SessionManager`] that logs in, logs out and keeps
//! the token honest by re-checking it with the server, and role /
//! permission queries the UI gates itself on. Around it sit the wire
//! types, the HTTP and WebSocket transports, and notification polling.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futuremesh::prelude::*;
//!
//! # async fn run() -> Result<(), FutureMeshError> {
//! let client = FutureMesh::open(ClientConfig::default().base_url("http://localhost:5000"))?;
//! let user = client.session().login("a@b.com", "secret1").await?;
//! if client.session().has_permission(Role::Hr) {
//!     println!("{} can review applications", user.id);
//! }
//! client.session().logout();
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;

pub use client::FutureMesh;
pub use config::{ClientConfig, STORAGE_ENV, URL_ENV};
pub use error::FutureMeshError;

pub use futuremesh_notify::{NotificationFeed, NotificationPoller, NotifyConfig, NotifyError, PollerHandle};
pub use futuremesh_protocol::{Endpoint, MenuItem, Notification, Role, UserProfile};
pub use futuremesh_session::{
    FileBackend, MemoryBackend, SessionConfig, SessionError, SessionEvent, SessionManager,
    SessionPhase, SessionStore,
};
pub use futuremesh_transport::{HttpClient, HttpRequest, HttpResponse, TransportError};

/// Everything an application usually needs, in one import.
pub mod prelude {
    pub use crate::{
        ClientConfig, FutureMesh, FutureMeshError, NotificationFeed, NotifyConfig, Role,
        SessionConfig, SessionError, SessionManager, SessionPhase, UserProfile,
    };
}
