//! The `FutureMesh` client: one session plus everything hanging off it.
//!
//! This is the entry point for applications. It ties the layers together:
//! transport → protocol → session → notifications.

use futuremesh_notify::{NotificationPoller, PollerHandle};
use futuremesh_session::{FileBackend, SessionError, SessionManager, SessionStore};
use futuremesh_transport::{HttpClient, ReqwestClient, WebSocketLink};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::{ClientConfig, FutureMeshError};

/// A configured FutureMesh client.
///
/// # Example
///
/// ```rust,no_run
/// use futuremesh::prelude::*;
///
/// # async fn run() -> Result<(), FutureMeshError> {
/// let client = FutureMesh::open(ClientConfig::from_env())?;
/// client.session().login("a@b.com", "secret1").await?;
/// let feed = client.notifications().fetch().await?;
/// println!("{} unread", feed.unread_count);
/// # Ok(())
/// # }
/// ```
pub struct FutureMesh<H: HttpClient = ReqwestClient> {
    session: SessionManager<H>,
    config: ClientConfig,
    online: watch::Sender<bool>,
}

impl FutureMesh<ReqwestClient> {
    /// A client over HTTP with the session persisted at
    /// `config.storage_path`.
    ///
    /// # Errors
    /// [`FutureMeshError::Config`] if `config` doesn't validate.
    pub fn open(config: ClientConfig) -> Result<Self, FutureMeshError> {
        config.validate()?;
        let store = SessionStore::new(
            FileBackend::new(config.storage_path.clone()),
            &config.session.namespace,
        );
        Ok(Self::with_parts(ReqwestClient::new(), store, config))
    }
}

impl<H: HttpClient> FutureMesh<H> {
    /// A client over any [`HttpClient`] and store.
    pub fn with_parts(http: H, store: SessionStore, config: ClientConfig) -> Self {
        let session = SessionManager::builder(http, &config.base_url)
            .store(store)
            .config(config.session.clone())
            .build();
        let (online, _) = watch::channel(true);
        debug!(api = %config.base_url, "client created");
        Self {
            session,
            config,
            online,
        }
    }

    pub fn session(&self) -> &SessionManager<H> {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A notification poller over this client's session.
    pub fn notifications(&self) -> NotificationPoller<H> {
        NotificationPoller::new(self.session.clone(), self.config.notify.clone())
    }

    /// Reports connectivity. Going from offline to online triggers an
    /// immediate token check once background work is running.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.send_replace(online);
        if previous != online {
            info!(online, "connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Starts the background work of a signed-in client: token
    /// revalidation, following sibling logouts (on the session's bus and in
    /// the shared session file), and notification polling. Dropping the
    /// returned handle stops polling; revalidation stops on logout.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_background(&self) -> PollerHandle {
        self.session.enable_revalidation(self.online.subscribe());
        self.session.listen_for_invalidations();
        self.session.watch_storage();
        self.notifications().spawn()
    }

    /// Opens the real-time WebSocket at `url` with the session's token and
    /// attaches it to the session, so logout closes it. Returns the
    /// channel of incoming text frames.
    ///
    /// # Errors
    /// - [`SessionError::NotAuthenticated`] without a token
    /// - [`FutureMeshError::Transport`] if the connection fails
    pub async fn connect_realtime(
        &self,
        url: &str,
    ) -> Result<mpsc::UnboundedReceiver<String>, FutureMeshError> {
        let token = self.session.token().ok_or(SessionError::NotAuthenticated)?;
        let (link, events) = WebSocketLink::connect(url, &token).await?;
        self.session.attach_realtime(link);
        info!(url, "real-time link attached");
        Ok(events)
    }
}
