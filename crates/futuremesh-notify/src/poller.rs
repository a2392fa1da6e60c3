//! Fetching and polling the notification feed.
//!
//! Every call goes through [`SessionManager::authenticated_request`], so
//! notifications are only fetched with a live token and a 401 here ends
//! the session exactly as it would anywhere else.
//!
//! The background loop is driven by an [`IntervalScheduler`]:
//!
//! ```text
//! fetch now
//! loop {
//!     wait_for_tick()          (every poll_interval)
//!     not authenticated? skip
//!     fetch → publish the feed on the watch channel
//!     error → log, keep polling
//! }
//! ```

use futuremesh_protocol::{Endpoint, ErrorBody, NotificationList, ProtocolError, RecordId};
use futuremesh_session::{SessionError, SessionManager};
use futuremesh_tick::{IntervalConfig, IntervalScheduler};
use futuremesh_transport::{HttpClient, HttpRequest, HttpResponse};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{NotificationFeed, NotifyConfig, NotifyError};

/// Reads and updates the signed-in user's notifications.
pub struct NotificationPoller<H: HttpClient> {
    session: SessionManager<H>,
    config: NotifyConfig,
}

impl<H: HttpClient> NotificationPoller<H> {
    pub fn new(session: SessionManager<H>, config: NotifyConfig) -> Self {
        Self { session, config }
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionManager<H> {
        &self.session
    }

    /// Fetches the current feed.
    ///
    /// # Errors
    /// - [`NotifyError::Session`] when there is no session, the token was
    ///   rejected (the session is already torn down), or the server is
    ///   unreachable
    /// - [`NotifyError::Rejected`] for any other non-success status
    /// - [`NotifyError::Protocol`] when the body isn't a notification list
    pub async fn fetch(&self) -> Result<NotificationFeed, NotifyError> {
        let request = HttpRequest::get(self.session.url(Endpoint::Notifications));
        let response = self.session.authenticated_request(request).await?;
        if !response.is_success() {
            return Err(rejected(&response, "Failed to load notifications"));
        }

        let list: NotificationList = response.json().map_err(ProtocolError::Decode)?;
        let feed = NotificationFeed::from(list);
        debug!(total = feed.len(), unread = feed.unread_count, "notifications fetched");
        Ok(feed)
    }

    /// Marks the notification `id` as read on the server.
    pub async fn mark_read(&self, id: &RecordId) -> Result<(), NotifyError> {
        let id = id.to_string();
        let url = self
            .session
            .api()
            .url(Endpoint::MarkNotificationRead, &[("id", id.as_str())]);
        let response = self.session.authenticated_request(HttpRequest::post(url)).await?;
        if !response.is_success() {
            return Err(rejected(&response, "Failed to mark notification as read"));
        }
        debug!(%id, "notification marked read");
        Ok(())
    }

    /// Starts polling in the background: one fetch right away, then one
    /// every [`NotifyConfig::poll_interval`] while the session is
    /// authenticated. Each successful fetch replaces the feed in the
    /// returned handle. Failed fetches are logged and polling continues.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> PollerHandle {
        let (tx, rx) = watch::channel(NotificationFeed::default());
        let scheduler = IntervalScheduler::new(IntervalConfig::every(self.config.poll_interval));
        let task = tokio::spawn(self.run(tx, scheduler));
        PollerHandle { task, feed: rx }
    }

    async fn run(self, tx: watch::Sender<NotificationFeed>, mut scheduler: IntervalScheduler) {
        debug!(
            interval_secs = self.config.poll_interval.as_secs_f64(),
            "notification polling started"
        );
        self.poll_once(&tx).await;
        loop {
            let tick = scheduler.wait_for_tick().await;
            trace!(tick = tick.tick, "notification poll");
            self.poll_once(&tx).await;
        }
    }

    async fn poll_once(&self, tx: &watch::Sender<NotificationFeed>) {
        if !self.session.is_authenticated() {
            trace!("not authenticated, skipping notification poll");
            return;
        }
        match self.fetch().await {
            Ok(feed) => {
                tx.send_replace(feed);
            }
            Err(NotifyError::Session(
                e @ (SessionError::Unauthorized | SessionError::Superseded | SessionError::NotAuthenticated),
            )) => {
                debug!(error = %e, "session ended during notification poll");
            }
            Err(e) => warn!(error = %e, "Failed to load notifications"),
        }
    }
}

/// A running poll loop. Dropping the handle stops polling.
#[derive(Debug)]
pub struct PollerHandle {
    task: JoinHandle<()>,
    feed: watch::Receiver<NotificationFeed>,
}

impl PollerHandle {
    /// The most recently fetched feed (empty until the first fetch lands).
    pub fn feed(&self) -> NotificationFeed {
        self.feed.borrow().clone()
    }

    /// A receiver that is notified every time a new feed arrives.
    pub fn subscribe(&self) -> watch::Receiver<NotificationFeed> {
        self.feed.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops polling. Same as dropping the handle.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn rejected(response: &HttpResponse, fallback: &str) -> NotifyError {
    let message = response
        .json::<ErrorBody>()
        .ok()
        .and_then(|body| body.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    NotifyError::Rejected {
        status: response.status,
        message,
    }
}
