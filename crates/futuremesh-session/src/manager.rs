//! The session manager: owns the signed-in user's state.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Logging in and registering (token + profile from the server)
//! - Restoring a persisted session at startup and checking it's still good
//! - Decorating authenticated requests and ending the session on a 401
//! - Profile and password operations
//! - Answering role / permission queries synchronously
//! - Logging out, here and in every sibling listening on the bus
//!
//! # Concurrency note
//!
//! `SessionManager` is a cheap handle around an `Arc`; clone it into any
//! task that needs it. Session state sits behind a `parking_lot::Mutex`
//! that is only ever held for a few field updates, never across an
//! `.await`. Login, registration and verification additionally take an
//! async in-flight guard so they run one at a time.
//!
//! Logout does NOT take that guard. It is synchronous, bumps the session
//! generation, and any in-flight operation that finishes afterwards sees
//! the new generation and discards its result with
//! [`SessionError::Superseded`].

use std::sync::{Arc, Weak};

use futuremesh_protocol::{
    ApiBase, AuthResponse, ChangePasswordRequest, ChangePasswordResponse, Endpoint, ErrorBody,
    LoginRequest, MenuItem, PasswordResetConfirm, PasswordResetRequest, ProfileResponse,
    ProtocolError, Role, UserProfile, menu_for,
};
use futuremesh_tick::{IntervalConfig, IntervalScheduler};
use futuremesh_transport::{HttpClient, HttpRequest, HttpResponse, RealtimeLink};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bus::{InvalidationBus, OriginId, SessionEvent};
use crate::navigator::{MemoryNavigator, Navigator};
use crate::revalidate::RevalidationHandle;
use crate::session::{Session, SessionConfig, SessionPhase};
use crate::store::{MemoryBackend, SessionStore};
use crate::SessionError;

const JSON: &str = "application/json";

/// Why a session ended. Shows up in logs, and decides whether the
/// shared storage is cleared and siblings are told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out.
    Explicit,
    /// An authenticated call came back 401.
    Unauthorized,
    /// A startup or periodic token check failed.
    VerificationFailed,
    /// A sibling sharing our storage logged out. The sibling already
    /// cleared the storage and told everyone, so neither happens again.
    Remote,
}

impl LogoutReason {
    pub fn as_str(self) -> &'static str {
        match self {
            LogoutReason::Explicit => "explicit",
            LogoutReason::Unauthorized => "unauthorized",
            LogoutReason::VerificationFailed => "verification_failed",
            LogoutReason::Remote => "remote",
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Everything behind the manager's `Arc`.
pub(crate) struct Shared<H> {
    http: H,
    api: ApiBase,
    store: SessionStore,
    config: SessionConfig,
    navigator: Arc<dyn Navigator>,
    bus: InvalidationBus,
    origin: OriginId,
    state: Mutex<Session>,
    /// Serializes login / register / verify.
    in_flight: tokio::sync::Mutex<()>,
    /// The live real-time connection, if one was attached.
    realtime: Mutex<Option<Box<dyn RealtimeLink>>>,
    /// Connectivity signal for revalidation. `None` until revalidation is enabled.
    connectivity: Mutex<Option<watch::Receiver<bool>>>,
    revalidation: Mutex<Option<RevalidationHandle>>,
    listener: Mutex<Option<tokio::task::AbortHandle>>,
    storage_watch: Mutex<Option<tokio::task::AbortHandle>>,
}

impl<H> Drop for Shared<H> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
        if let Some(watch) = self.storage_watch.get_mut().take() {
            watch.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds a [`SessionManager`].
///
/// ```rust,ignore
/// # use futuremesh_session::{SessionManager, SessionStore, FileBackend};
/// # use futuremesh_transport::ReqwestClient;
/// let store = SessionStore::new(FileBackend::new("/tmp/session.json"), "futuremesh");
/// let manager = SessionManager::builder(ReqwestClient::new(), "http://localhost:5000")
///     .store(store)
///     .build();
/// ```
pub struct SessionManagerBuilder<H> {
    http: H,
    api: ApiBase,
    store: Option<SessionStore>,
    config: SessionConfig,
    navigator: Option<Arc<dyn Navigator>>,
    bus: Option<InvalidationBus>,
}

impl<H: HttpClient> SessionManagerBuilder<H> {
    /// Durable storage. Default: an in-memory store in the config's namespace.
    pub fn store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: a [`MemoryNavigator`] starting at `/`.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Joins an existing bus shared with sibling managers. Default: a
    /// private bus.
    pub fn bus(mut self, bus: InvalidationBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> SessionManager<H> {
        let store = self
            .store
            .unwrap_or_else(|| SessionStore::new(MemoryBackend::new(), &self.config.namespace));
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(MemoryNavigator::default()) as Arc<dyn Navigator>);
        let origin = OriginId::next();

        debug!(
            %origin,
            api = self.api.as_str(),
            namespace = store.namespace(),
            "session manager created"
        );

        SessionManager {
            shared: Arc::new(Shared {
                http: self.http,
                api: self.api,
                store,
                config: self.config,
                navigator,
                bus: self.bus.unwrap_or_default(),
                origin,
                state: Mutex::new(Session::default()),
                in_flight: tokio::sync::Mutex::new(()),
                realtime: Mutex::new(None),
                connectivity: Mutex::new(None),
                revalidation: Mutex::new(None),
                listener: Mutex::new(None),
                storage_watch: Mutex::new(None),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Owns the authentication state of one client (one "tab").
///
/// ## Lifecycle
///
/// ```text
/// restore() ──→ [Verifying] ──ok──→ [Authenticated] ←── login() / register()
///                   │                   │      ↑
///                   │ rejected          │      │ revalidation ok
///                   ▼                   ▼      │
///           [Unauthenticated] ←─ logout() / 401 / revalidation failed
/// ```
pub struct SessionManager<H: HttpClient> {
    shared: Arc<Shared<H>>,
}

impl<H: HttpClient> Clone for SessionManager<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: HttpClient> SessionManager<H> {
    /// A manager for the API at `base_url` with default settings.
    pub fn new(http: H, base_url: &str) -> Self {
        Self::builder(http, base_url).build()
    }

    pub fn builder(http: H, base_url: &str) -> SessionManagerBuilder<H> {
        SessionManagerBuilder {
            http,
            api: ApiBase::new(base_url),
            store: None,
            config: SessionConfig::default(),
            navigator: None,
            bus: None,
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared<H>> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn upgrade(weak: &Weak<Shared<H>>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    // -- accessors ----------------------------------------------------------

    pub fn http(&self) -> &H {
        &self.shared.http
    }

    pub fn api(&self) -> &ApiBase {
        &self.shared.api
    }

    pub fn store(&self) -> &SessionStore {
        &self.shared.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn origin(&self) -> OriginId {
        self.shared.origin
    }

    /// Full URL of a parameterless endpoint.
    pub fn url(&self, endpoint: Endpoint) -> String {
        self.shared.api.url(endpoint, &[])
    }

    // -- queries ------------------------------------------------------------

    /// True iff both a token and a profile are held in memory.
    pub fn is_authenticated(&self) -> bool {
        self.shared.state.lock().is_authenticated()
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.state.lock().phase
    }

    pub fn generation(&self) -> u64 {
        self.shared.state.lock().generation
    }

    /// A copy of the in-memory session.
    pub fn snapshot(&self) -> Session {
        self.shared.state.lock().clone()
    }

    /// The signed-in user. Falls back to the persisted snapshot while
    /// memory is empty, e.g. before the startup check has finished.
    pub fn current_user(&self) -> Option<UserProfile> {
        let in_memory = self.shared.state.lock().current_user.clone();
        in_memory.or_else(|| self.shared.store.user())
    }

    /// The bearer token: the in-memory one, else the persisted one.
    pub fn token(&self) -> Option<String> {
        let in_memory = self.shared.state.lock().access_token.clone();
        in_memory
            .or_else(|| self.shared.store.token())
            .filter(|t| !t.is_empty())
    }

    /// Whether the current user has exactly `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.current_user().is_some_and(|u| u.role == role)
    }

    /// Whether the current user's role ranks at least as high as `required`.
    pub fn has_permission(&self, required: Role) -> bool {
        self.current_user().is_some_and(|u| u.role.satisfies(required))
    }

    /// Returns `true` when authenticated. Otherwise logs out (which also
    /// navigates to the login page) and returns `false`.
    pub fn require_auth(&self) -> bool {
        if self.is_authenticated() {
            return true;
        }
        self.logout();
        false
    }

    /// Returns `true` when the current user has exactly `role`.
    pub fn require_role(&self, role: Role) -> bool {
        if self.has_role(role) {
            return true;
        }
        warn!(required = %role, "Access denied: Insufficient permissions");
        false
    }

    /// The headers an authenticated call carries.
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_string(), JSON.to_string())];
        if let Some(token) = self.token() {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    /// Navigation entries for the current user's role. Empty when nobody
    /// is signed in.
    pub fn menu(&self) -> &'static [MenuItem] {
        self.current_user().map(|u| menu_for(u.role)).unwrap_or(&[])
    }

    /// Events published on this manager's bus from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.bus.subscribe()
    }

    // -- login / registration -----------------------------------------------

    /// Logs in with email and password.
    ///
    /// On success the token and profile are persisted, the session becomes
    /// `Authenticated`, siblings are told, and the navigator is sent to the
    /// landing page.
    ///
    /// # Errors
    /// - [`SessionError::AuthFailed`] with the server's message (or
    ///   `"Login failed"`) for a non-success response
    /// - [`SessionError::Network`] if the server couldn't be reached
    /// - [`SessionError::Superseded`] if a logout happened meanwhile
    /// - [`SessionError::Storage`] if the credentials couldn't be persisted
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, SessionError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let request = HttpRequest::post(self.url(Endpoint::Login)).json(&body)?;
        self.authenticate(request, "Login failed").await
    }

    /// Creates an account and logs in with it. Same contract as
    /// [`login`](Self::login), with `"Registration failed"` as the
    /// fallback message.
    pub async fn register<T: Serialize>(&self, profile: &T) -> Result<UserProfile, SessionError> {
        let request = HttpRequest::post(self.url(Endpoint::Register)).json(profile)?;
        self.authenticate(request, "Registration failed").await
    }

    async fn authenticate(
        &self,
        request: HttpRequest,
        fallback: &str,
    ) -> Result<UserProfile, SessionError> {
        let _guard = self.shared.in_flight.lock().await;
        let issued = self.generation();

        debug!(url = %request.url, "sending credentials");
        let response = self.shared.http.send(request).await?;
        if !response.is_success() {
            let message = error_message(&response, fallback);
            warn!(status = response.status, %message, "authentication rejected");
            return Err(SessionError::AuthFailed(message));
        }

        let auth: AuthResponse = response.json().map_err(ProtocolError::Decode)?;
        if auth.access_token.is_empty() {
            return Err(SessionError::AuthFailed(fallback.to_string()));
        }
        let user = auth.user;

        let generation = {
            let mut state = self.shared.state.lock();
            if state.generation != issued {
                debug!(issued, current = state.generation, "discarding stale login");
                return Err(SessionError::Superseded);
            }
            if !self.shared.store.save_credentials(&auth.access_token, &user) {
                return Err(SessionError::Storage("could not persist credentials".into()));
            }
            state.access_token = Some(auth.access_token);
            state.current_user = Some(user.clone());
            state.phase = SessionPhase::Authenticated;
            state.generation += 1;
            state.generation
        };

        info!(user = %user.id, role = %user.role, generation, "logged in");
        self.shared.bus.publish(SessionEvent::LoggedIn {
            origin: self.shared.origin,
            generation,
        });
        self.ensure_revalidation();
        self.shared.navigator.navigate(&self.shared.config.landing_path);
        Ok(user)
    }

    // -- startup / verification ---------------------------------------------

    /// The startup check.
    ///
    /// With no persisted token and profile this logs out and returns
    /// [`SessionError::NotAuthenticated`]. Otherwise the session enters
    /// `Verifying`, the token is checked against the server, and the
    /// session either becomes `Authenticated` or is logged out.
    pub async fn restore(&self) -> Result<UserProfile, SessionError> {
        let _guard = self.shared.in_flight.lock().await;

        let Some((token, _)) = self.shared.store.load_credentials() else {
            debug!("no persisted session");
            self.logout();
            return Err(SessionError::NotAuthenticated);
        };

        let issued = {
            let mut state = self.shared.state.lock();
            state.phase = SessionPhase::Verifying;
            state.generation
        };
        info!("verifying restored session");

        let user = match self.fetch_profile(&token).await {
            Ok(user) => user,
            Err(e) => {
                if self.generation() == issued {
                    warn!(error = %e, "restored session rejected");
                    self.logout_with(LogoutReason::VerificationFailed);
                }
                return Err(e);
            }
        };

        {
            let mut state = self.shared.state.lock();
            if state.generation != issued {
                debug!(issued, current = state.generation, "discarding stale restore");
                return Err(SessionError::Superseded);
            }
            if !self.shared.store.save_user(&user) {
                warn!("could not persist refreshed profile");
            }
            state.access_token = Some(token);
            state.current_user = Some(user.clone());
            state.phase = SessionPhase::Authenticated;
        }

        info!(user = %user.id, role = %user.role, "session restored");
        self.ensure_revalidation();
        Ok(user)
    }

    /// Fetches the current profile with the stored token and refreshes the
    /// cached copy.
    ///
    /// Never logs out by itself: deciding what a failure means is the
    /// caller's job (the startup check and the revalidation task both log
    /// out).
    ///
    /// # Errors
    /// - [`SessionError::NotAuthenticated`] when no token is stored;
    ///   nothing is touched
    /// - [`SessionError::AuthFailed`] when the server rejects the token
    /// - [`SessionError::Network`] when the server can't be reached
    /// - [`SessionError::Superseded`] if a logout or login happened meanwhile
    pub async fn verify(&self) -> Result<UserProfile, SessionError> {
        let _guard = self.shared.in_flight.lock().await;
        let token = self.token().ok_or(SessionError::NotAuthenticated)?;

        let (issued, previous) = {
            let mut state = self.shared.state.lock();
            let previous = state.phase;
            if previous == SessionPhase::Authenticated {
                state.phase = SessionPhase::Verifying;
            }
            (state.generation, previous)
        };

        let result = self.fetch_profile(&token).await;

        let mut state = self.shared.state.lock();
        if state.generation != issued {
            debug!(issued, current = state.generation, "discarding stale verification");
            return Err(SessionError::Superseded);
        }
        state.phase = previous;
        let user = result?;

        if state.access_token.is_some() {
            state.current_user = Some(user.clone());
        }
        if !self.shared.store.save_user(&user) {
            warn!("could not persist refreshed profile");
        }
        debug!(user = %user.id, "token verified");
        Ok(user)
    }

    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, SessionError> {
        let request = HttpRequest::get(self.url(Endpoint::Profile))
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", JSON);
        let response = self.shared.http.send(request).await?;
        if !response.is_success() {
            debug!(status = response.status, "token verification rejected");
            return Err(SessionError::AuthFailed("Token verification failed".into()));
        }
        let body: ProfileResponse = response.json().map_err(ProtocolError::Decode)?;
        Ok(body.user)
    }

    // -- authenticated calls ------------------------------------------------

    /// Sends `request` with the session's bearer token.
    ///
    /// `Content-Type: application/json` and `Authorization: Bearer <token>`
    /// are added unless the request already carries those headers. Any
    /// status other than 401 is returned as-is.
    ///
    /// # Errors
    /// - [`SessionError::NotAuthenticated`] when there is no token; nothing is sent
    /// - [`SessionError::Unauthorized`] on a 401, after the session has
    ///   been torn down
    /// - [`SessionError::Network`] when the server can't be reached
    pub async fn authenticated_request(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, SessionError> {
        let token = self.token().ok_or(SessionError::NotAuthenticated)?;
        let issued = self.generation();
        let request = request
            .header_if_absent("Content-Type", JSON)
            .header_if_absent("Authorization", format!("Bearer {token}"));

        debug!(method = %request.method, url = %request.url, "authenticated request");
        let response = self.shared.http.send(request).await?;

        if response.is_unauthorized() {
            if self.generation() != issued {
                return Err(SessionError::Superseded);
            }
            warn!("request unauthorized, ending session");
            self.logout_with(LogoutReason::Unauthorized);
            return Err(SessionError::Unauthorized);
        }
        Ok(response)
    }

    /// Updates the signed-in user's profile and refreshes the cached copy.
    pub async fn update_profile<T: Serialize>(&self, data: &T) -> Result<UserProfile, SessionError> {
        let request = HttpRequest::put(self.url(Endpoint::Profile)).json(data)?;
        let issued = self.generation();
        let response = self.authenticated_request(request).await?;
        let response = ensure_success(response, "Profile update failed")?;
        let body: ProfileResponse = response.json().map_err(ProtocolError::Decode)?;

        {
            let mut state = self.shared.state.lock();
            if state.generation != issued {
                return Err(SessionError::Superseded);
            }
            if !self.shared.store.save_user(&body.user) {
                return Err(SessionError::Storage("could not persist profile".into()));
            }
            if state.access_token.is_some() {
                state.current_user = Some(body.user.clone());
            }
        }

        info!(user = %body.user.id, "profile updated");
        Ok(body.user)
    }

    /// Changes the password. If the server rotates the token, the new one
    /// replaces the old in memory and in storage.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<ChangePasswordResponse, SessionError> {
        let body = ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        };
        let request = HttpRequest::post(self.url(Endpoint::ChangePassword)).json(&body)?;
        let issued = self.generation();
        let response = self.authenticated_request(request).await?;
        let response = ensure_success(response, "Password change failed")?;
        let body: ChangePasswordResponse = if response.body.is_empty() {
            ChangePasswordResponse::default()
        } else {
            response.json().map_err(ProtocolError::Decode)?
        };

        if let Some(token) = body.access_token.as_deref().filter(|t| !t.is_empty()) {
            let mut state = self.shared.state.lock();
            if state.generation != issued {
                return Err(SessionError::Superseded);
            }
            if !self.shared.store.save_token(token) {
                return Err(SessionError::Storage("could not persist rotated token".into()));
            }
            if state.access_token.is_some() {
                state.access_token = Some(token.to_string());
            }
            info!("access token rotated after password change");
        }
        Ok(body)
    }

    /// Asks the server to send a password-reset email. Returns the
    /// server's response body.
    pub async fn request_password_reset(&self, email: &str) -> Result<Value, SessionError> {
        let body = PasswordResetRequest {
            email: email.to_string(),
        };
        let request = HttpRequest::post(self.url(Endpoint::ResetPassword)).json(&body)?;
        let response = self.shared.http.send(request).await?;
        let response = ensure_success(response, "Password reset request failed")?;
        json_or_null(&response)
    }

    /// Sets a new password using the token from a reset email. Returns the
    /// server's response body.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<Value, SessionError> {
        let body = PasswordResetConfirm {
            token: token.to_string(),
            new_password: new_password.to_string(),
        };
        let request = HttpRequest::post(self.url(Endpoint::ResetPasswordConfirm)).json(&body)?;
        let response = self.shared.http.send(request).await?;
        let response = ensure_success(response, "Password reset failed")?;
        json_or_null(&response)
    }

    // -- logout ---------------------------------------------------------------

    /// Ends the session. Same as `logout_with(LogoutReason::Explicit)`.
    pub fn logout(&self) {
        self.logout_with(LogoutReason::Explicit);
    }

    /// Ends the session, whatever state it was in.
    ///
    /// Clears memory and (unless `reason` is [`LogoutReason::Remote`]) the
    /// persisted credentials, disconnects the real-time link, stops
    /// revalidation, bumps the generation, tells siblings, and navigates to
    /// the login page unless the current page is public. Safe to call when
    /// already logged out.
    pub fn logout_with(&self, reason: LogoutReason) {
        let (had_session, generation) = {
            let mut state = self.shared.state.lock();
            let had_session = state.access_token.is_some()
                || state.phase != SessionPhase::Unauthenticated
                || (reason != LogoutReason::Remote && self.shared.store.token().is_some());
            state.clear();
            state.generation += 1;
            if reason != LogoutReason::Remote {
                self.shared.store.clear_credentials();
            }
            (had_session, state.generation)
        };

        let link = self.shared.realtime.lock().take();
        if let Some(link) = link {
            debug!(link = %link.id(), "closing real-time link");
            link.disconnect();
        }
        let revalidation = self.shared.revalidation.lock().take();
        drop(revalidation);

        if had_session {
            info!(origin = %self.shared.origin, generation, reason = reason.as_str(), "logged out");
            if reason != LogoutReason::Remote {
                self.shared.bus.publish(SessionEvent::Invalidated {
                    origin: self.shared.origin,
                    generation,
                });
            }
        } else {
            debug!(generation, "logout with no session");
        }

        let current = self.shared.navigator.current_path();
        if !self.shared.config.is_public(&current) {
            self.shared.navigator.navigate(&self.shared.config.login_path);
        }
    }

    // -- real-time link -----------------------------------------------------

    /// Registers the live real-time connection. It is disconnected on
    /// logout. A previously attached link is disconnected now.
    pub fn attach_realtime(&self, link: impl RealtimeLink) {
        let previous = self.shared.realtime.lock().replace(Box::new(link));
        if let Some(old) = previous {
            debug!(link = %old.id(), "replacing real-time link");
            old.disconnect();
        }
    }

    pub fn has_realtime(&self) -> bool {
        self.shared.realtime.lock().is_some()
    }

    // -- revalidation -------------------------------------------------------

    /// Turns on background revalidation driven by `connectivity`
    /// (`true` = online).
    ///
    /// While a session is established, a task re-checks the token every
    /// [`SessionConfig::revalidate_every`] and right after connectivity
    /// comes back, and logs out if the check fails. The task stops on
    /// logout and starts again on the next login.
    pub fn enable_revalidation(&self, connectivity: watch::Receiver<bool>) {
        *self.shared.connectivity.lock() = Some(connectivity);
        if self.is_authenticated() {
            self.ensure_revalidation();
        }
    }

    /// Whether a revalidation task is running.
    pub fn revalidation_active(&self) -> bool {
        self.shared
            .revalidation
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn ensure_revalidation(&self) {
        let Some(connectivity) = self.shared.connectivity.lock().clone() else {
            return;
        };
        let generation = self.generation();
        let mut slot = self.shared.revalidation.lock();
        if slot
            .as_ref()
            .is_some_and(|h| !h.is_finished() && h.generation() == generation)
        {
            return;
        }
        // A task left over from an earlier login would exit at its next tick.
        drop(slot.take());
        match RevalidationHandle::spawn(self, connectivity) {
            Some(handle) => *slot = Some(handle),
            None => warn!("no tokio runtime, revalidation not started"),
        }
    }

    // -- sibling coordination -----------------------------------------------

    /// Starts following the bus: when a sibling logs out, this manager
    /// logs out too. Calling it again replaces the previous listener.
    pub fn listen_for_invalidations(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, not listening for invalidations");
            return;
        };
        let mut rx = self.shared.bus.subscribe();
        let weak = self.downgrade();

        let task = runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match SessionManager::upgrade(&weak) {
                        Some(manager) => manager.handle_event(event),
                        None => break,
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "invalidation listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let previous = self.shared.listener.lock().replace(task.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Starts polling the store for a token removed behind our back, every
    /// [`SessionConfig::storage_check_every`]. This is how separate
    /// processes sharing one session file follow each other's logouts; the
    /// bus only reaches managers in the same process. Calling it again
    /// replaces the previous watcher.
    pub fn watch_storage(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, not watching storage");
            return;
        };
        let mut scheduler = IntervalScheduler::new(IntervalConfig::every(
            self.shared.config.storage_check_every,
        ));
        let weak = self.downgrade();

        let task = runtime.spawn(async move {
            loop {
                scheduler.wait_for_tick().await;
                match SessionManager::upgrade(&weak) {
                    Some(manager) => {
                        manager.check_storage();
                    }
                    None => break,
                }
            }
        });

        let previous = self.shared.storage_watch.lock().replace(task.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Logs out locally if this manager holds a session whose token is no
    /// longer in the store. Returns whether it logged out.
    pub fn check_storage(&self) -> bool {
        let removed = {
            let state = self.shared.state.lock();
            state.access_token.is_some() && self.shared.store.token().is_none()
        };
        if removed {
            info!(origin = %self.shared.origin, "stored token removed elsewhere, ending session");
            self.logout_with(LogoutReason::Remote);
        }
        removed
    }

    /// Applies an event from the bus. Our own events are ignored.
    pub fn handle_event(&self, event: SessionEvent) {
        if event.origin() == self.shared.origin {
            return;
        }
        match event {
            SessionEvent::Invalidated { origin, .. } => {
                let holds_session = {
                    let state = self.shared.state.lock();
                    state.access_token.is_some() || state.phase != SessionPhase::Unauthenticated
                };
                if holds_session {
                    info!(from = %origin, "sibling logged out, ending session");
                    self.logout_with(LogoutReason::Remote);
                }
            }
            SessionEvent::LoggedIn { origin, .. } => {
                debug!(from = %origin, "sibling logged in");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// The server's `error` message, or `fallback` if the body has none.
fn error_message(response: &HttpResponse, fallback: &str) -> String {
    response
        .json::<ErrorBody>()
        .ok()
        .and_then(|body| body.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn ensure_success(response: HttpResponse, fallback: &str) -> Result<HttpResponse, SessionError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(SessionError::Rejected {
            status: response.status,
            message: error_message(&response, fallback),
        })
    }
}

fn json_or_null(response: &HttpResponse) -> Result<Value, SessionError> {
    if response.body.is_empty() {
        return Ok(Value::Null);
    }
    Ok(response.json().map_err(ProtocolError::Decode)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futuremesh_transport::TransportError;

    /// A client for tests that never touch the network.
    struct Offline;

    impl HttpClient for Offline {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Network("offline".into()))
        }
    }

    fn manager_with_user(role: Option<Role>) -> SessionManager<Offline> {
        let manager = SessionManager::new(Offline, "http://api.test");
        if let Some(role) = role {
            manager
                .store()
                .save_credentials("T1", &UserProfile::new(1u64, "a@b.com", role));
        }
        manager
    }

    #[test]
    fn test_new_manager_is_unauthenticated() {
        let m = manager_with_user(None);
        assert!(!m.is_authenticated());
        assert_eq!(m.phase(), SessionPhase::Unauthenticated);
        assert_eq!(m.generation(), 0);
        assert!(m.current_user().is_none());
        assert!(m.menu().is_empty());
    }

    #[test]
    fn test_has_permission_full_matrix() {
        for user_role in Role::ALL {
            let m = manager_with_user(Some(user_role));
            for required in Role::ALL {
                assert_eq!(
                    m.has_permission(required),
                    user_role.rank() >= required.rank(),
                    "{user_role} vs {required}"
                );
            }
        }
    }

    #[test]
    fn test_has_permission_hod_example() {
        let m = manager_with_user(Some(Role::Hod));
        assert!(m.has_permission(Role::Student));
        assert!(m.has_permission(Role::Hr));
        assert!(!m.has_permission(Role::Admin));
    }

    #[test]
    fn test_has_role_is_exact() {
        let m = manager_with_user(Some(Role::Alumni));
        assert!(m.has_role(Role::Alumni));
        assert!(!m.has_role(Role::Student));
        assert!(m.require_role(Role::Alumni));
        assert!(!m.require_role(Role::Admin));
    }

    #[test]
    fn test_current_user_falls_back_to_store() {
        let m = manager_with_user(Some(Role::Hr));
        assert!(!m.is_authenticated(), "memory is still empty");
        assert_eq!(m.current_user().map(|u| u.role), Some(Role::Hr));
    }

    #[test]
    fn test_auth_headers_with_and_without_token() {
        let m = manager_with_user(None);
        assert_eq!(
            m.auth_headers(),
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );

        let m = manager_with_user(Some(Role::Student));
        assert!(
            m.auth_headers()
                .contains(&("Authorization".to_string(), "Bearer T1".to_string()))
        );
    }

    #[test]
    fn test_menu_follows_role() {
        let m = manager_with_user(Some(Role::Student));
        assert_eq!(m.menu(), menu_for(Role::Student));
    }

    #[test]
    fn test_require_auth_logs_out_when_unauthenticated() {
        let nav = Arc::new(MemoryNavigator::new("/jobs"));
        let m = SessionManager::builder(Offline, "http://api.test")
            .navigator(nav.clone())
            .build();
        m.store()
            .save_credentials("T1", &UserProfile::new(1u64, "a@b.com", Role::Student));

        assert!(!m.require_auth());
        assert!(m.store().token().is_none());
        assert_eq!(nav.current_path(), "/login");
    }

    #[test]
    fn test_logout_is_idempotent_and_stays_on_public_page() {
        let nav = Arc::new(MemoryNavigator::new("/register"));
        let m = SessionManager::builder(Offline, "http://api.test")
            .navigator(nav.clone())
            .build();

        m.logout();
        m.logout();

        assert!(!m.is_authenticated());
        assert!(nav.history().is_empty());
    }

    #[test]
    fn test_handle_event_ignores_own_origin() {
        let m = manager_with_user(None);
        let before = m.generation();
        m.handle_event(SessionEvent::Invalidated {
            origin: m.origin(),
            generation: 9,
        });
        assert_eq!(m.generation(), before);
    }

    #[test]
    fn test_error_message_prefers_server_text() {
        let resp = HttpResponse::new(400, br#"{"error":"Email already registered"}"#.to_vec());
        assert_eq!(error_message(&resp, "Registration failed"), "Email already registered");

        let resp = HttpResponse::new(500, b"<html>oops</html>".to_vec());
        assert_eq!(error_message(&resp, "Registration failed"), "Registration failed");

        let resp = HttpResponse::new(400, br#"{"error":""}"#.to_vec());
        assert_eq!(error_message(&resp, "Login failed"), "Login failed");
    }

    #[test]
    fn test_ensure_success_maps_status() {
        let resp = HttpResponse::new(403, br#"{"error":"Forbidden"}"#.to_vec());
        match ensure_success(resp, "Profile update failed") {
            Err(SessionError::Rejected { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Forbidden");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }
}
