//! Authentication session management for the FutureMesh client.
//!
//! This crate owns the lifecycle of a signed-in user:
//!
//! 1. **Persistence**: the access token and a profile snapshot survive
//!    restarts through a [`SessionStore`] over a pluggable [`StorageBackend`]
//! 2. **Session tracking**: [`SessionManager`] drives login, registration,
//!    logout and verification, and answers role / permission queries
//! 3. **Revalidation**: a background task re-checks the token every few
//!    minutes and whenever connectivity comes back
//! 4. **Sibling coordination**: an [`InvalidationBus`] lets one manager's
//!    logout sign out every other manager sharing the same storage
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade / CLI (above)  ← calls login, logout, queries the current user
//!     ↕
//! Session Layer (this crate)  ← token + profile state, generation counter
//!     ↕
//! Transport Layer (below)  ← HttpClient, RealtimeLink
//! Protocol Layer (below)   ← Role, UserProfile, Endpoint, request/response bodies
//! ```

mod bus;
mod error;
mod manager;
mod navigator;
mod revalidate;
mod session;
mod store;

pub use bus::{InvalidationBus, OriginId, SessionEvent};
pub use error::SessionError;
pub use manager::{LogoutReason, SessionManager, SessionManagerBuilder};
pub use navigator::{MemoryNavigator, Navigator};
pub use revalidate::RevalidationHandle;
pub use session::{Session, SessionConfig, SessionPhase};
pub use store::{FileBackend, MemoryBackend, SessionStore, StorageBackend};
