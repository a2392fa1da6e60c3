//! Wire protocol for the FutureMesh client.
//!
//! This crate defines the "language" the client and the FutureMesh REST
//! API speak:
//!
//! - **Types** ([`Role`], [`UserProfile`], [`AuthResponse`], etc.):
//!   the JSON bodies that travel over HTTP.
//! - **Endpoints** ([`Endpoint`], [`ApiBase`]): where those bodies go.
//! - **Menus** ([`MenuItem`], [`menu_for`]): the role-based navigation
//!   table the UI renders for each role.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how values are turned
//!   into bytes for storage and requests.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits below the session layer. It doesn't know about
//! HTTP clients, storage, or session state; it only knows the shapes of
//! the data.
//!
//! ```text
//! Transport (HTTP bytes) → Protocol (typed bodies) → Session (auth state)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod endpoint;
mod error;
mod menu;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{Codec, JsonCodec};
pub use endpoint::{ApiBase, Endpoint};
pub use error::ProtocolError;
pub use menu::{MenuItem, menu_for};
pub use types::{
    AuthResponse, ChangePasswordRequest, ChangePasswordResponse, ErrorBody,
    LoginRequest, Notification, NotificationList, PasswordResetConfirm,
    PasswordResetRequest, ProfileResponse, RecordId, Role, UserId, UserProfile,
};
