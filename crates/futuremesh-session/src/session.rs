//! Session types: the in-memory authentication state and its configuration.
//!
//! A "session" is the client's record of who is signed in. It tracks:
//! - WHO the user is (`current_user`)
//! - HOW requests prove it (`access_token`)
//! - WHERE the session is in its lifecycle (`phase`)
//! - WHICH incarnation of the session this is (`generation`)

use std::time::Duration;

use futuremesh_protocol::UserProfile;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
///
/// Sensible defaults are provided; override just the fields you care about:
///
/// ```rust
/// use futuremesh_session::SessionConfig;
///
/// let config = SessionConfig {
///     namespace: "staging".into(),
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.login_path, "/login");
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Prefix for the storage keys, so several apps (or environments)
    /// can share one storage medium. Default: `futuremesh`.
    pub namespace: String,

    /// Where to go after a successful login or registration.
    pub landing_path: String,

    /// Where to go after a logout.
    pub login_path: String,

    /// Pages reachable without a session. Logging out while on one of
    /// these doesn't navigate away.
    pub public_paths: Vec<String>,

    /// How often the background task re-checks the token.
    ///
    /// Default: 5 minutes. `Duration::ZERO` turns revalidation off,
    /// including the check on connectivity restore.
    pub revalidate_every: Duration,

    /// How often [`watch_storage`](crate::SessionManager::watch_storage)
    /// looks for a token removed by another process sharing the store.
    ///
    /// Default: 2 seconds. `Duration::ZERO` turns the check off.
    pub storage_check_every: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            namespace: "futuremesh".to_string(),
            landing_path: "/dashboard".to_string(),
            login_path: "/login".to_string(),
            public_paths: vec!["/".to_string(), "/login".to_string(), "/register".to_string()],
            revalidate_every: Duration::from_secs(5 * 60),
            storage_check_every: Duration::from_secs(2),
        }
    }
}

impl SessionConfig {
    /// Whether `path` is reachable without a session.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
    }
}

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle.
///
/// ```text
///                   login / register
///   Unauthenticated ────────────────────────→ Authenticated
///        │    ↑                                 │     ↑
///  restore│    │ rejected / unreachable /        │     │ confirmed
///        ↓    │ logout / 401                    ↓     │
///        Verifying ─────────(confirmed)────→  Verifying (periodic)
/// ```
///
/// `Verifying` covers both the startup check of a restored token and
/// the periodic re-check of a live one. During the startup check no
/// token is held in memory yet, so `is_authenticated()` is false; during
/// a periodic re-check the token and profile stay in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No session. The starting state, and the state after any logout.
    #[default]
    Unauthenticated,

    /// A token is being checked against the server.
    Verifying,

    /// The server accepted the token.
    Authenticated,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The in-memory session state.
///
/// Owned by exactly one [`SessionManager`](crate::SessionManager); readers
/// get snapshots through the manager's query methods.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Bearer credential. Present iff the session is established.
    pub access_token: Option<String>,

    /// Cached profile, refreshed on every successful verification or
    /// profile update.
    pub current_user: Option<UserProfile>,

    pub phase: SessionPhase,

    /// Bumped on every login and logout. An async operation records the
    /// generation it started under and only applies its result if the
    /// generation is unchanged when the response arrives.
    pub generation: u64,
}

impl Session {
    /// True iff both a token and a profile are held in memory.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty()) && self.current_user.is_some()
    }

    /// Drops the token and profile and returns to `Unauthenticated`.
    /// Leaves `generation` alone; the caller decides whether to bump it.
    pub fn clear(&mut self) {
        self.access_token = None;
        self.current_user = None;
        self.phase = SessionPhase::Unauthenticated;
    }
}
