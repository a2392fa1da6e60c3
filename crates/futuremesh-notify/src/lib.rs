//! Notification polling for the FutureMesh client.
//!
//! The signed-in user's notifications live on the server. This crate
//! fetches them through the session's authenticated request path (so a
//! 401 ends the session like any other call), summarises them as a
//! [`NotificationFeed`], and can keep polling in the background.
//!
//! # Key types
//!
//! - [`NotificationPoller`]: fetches the feed and marks entries read
//! - [`PollerHandle`]: a running poll loop; drop it to stop polling
//! - [`NotificationFeed`]: the latest list plus its unread count
//! - [`NotifyConfig`]: poll period and how many entries to show

mod config;
mod error;
mod feed;
mod poller;

pub use config::NotifyConfig;
pub use error::NotifyError;
pub use feed::NotificationFeed;
pub use poller::{NotificationPoller, PollerHandle};
