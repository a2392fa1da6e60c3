//! Client configuration.

use std::path::PathBuf;

use futuremesh_notify::NotifyConfig;
use futuremesh_session::{FileBackend, SessionConfig};

use crate::FutureMeshError;

/// Environment variable holding the API base URL.
pub const URL_ENV: &str = "FUTUREMESH_URL";
/// Environment variable holding the session file path.
pub const STORAGE_ENV: &str = "FUTUREMESH_STORAGE";

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Everything needed to build a [`FutureMesh`](crate::FutureMesh) client.
///
/// Start from [`Default`] or [`ClientConfig::from_env`] and override with
/// the builder-style setters:
///
/// ```rust
/// use std::time::Duration;
/// use futuremesh::ClientConfig;
///
/// let config = ClientConfig::default()
///     .base_url("https://placements.example.edu")
///     .revalidate_every(Duration::from_secs(60));
/// assert_eq!(config.base_url, "https://placements.example.edu");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the FutureMesh API, e.g. `http://localhost:5000`.
    pub base_url: String,

    /// File holding the persisted session.
    pub storage_path: PathBuf,

    pub session: SessionConfig,

    pub notify: NotifyConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            storage_path: FileBackend::default_path(),
            session: SessionConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `FUTUREMESH_URL` and `FUTUREMESH_STORAGE`
    /// when they are set and non-empty.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(URL_ENV).filter(|v| !v.is_empty()) {
            config.base_url = url;
        }
        if let Some(path) = lookup(STORAGE_ENV).filter(|v| !v.is_empty()) {
            config.storage_path = PathBuf::from(path);
        }
        config
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn notify(mut self, notify: NotifyConfig) -> Self {
        self.notify = notify;
        self
    }

    /// Shorthand for setting `session.revalidate_every`.
    pub fn revalidate_every(mut self, period: std::time::Duration) -> Self {
        self.session.revalidate_every = period;
        self
    }

    /// Checks the settings that can't be fixed later.
    ///
    /// # Errors
    /// [`FutureMeshError::Config`] if the base URL isn't `http(s)://...`
    /// or the storage namespace is empty.
    pub fn validate(&self) -> Result<(), FutureMeshError> {
        let scheme_ok = self.base_url.starts_with("http://") || self.base_url.starts_with("https://");
        if !scheme_ok {
            return Err(FutureMeshError::Config(format!(
                "base URL must start with http:// or https://, got {:?}",
                self.base_url
            )));
        }
        if self.session.namespace.is_empty() {
            return Err(FutureMeshError::Config("storage namespace is empty".into()));
        }
        Ok(())
    }
}
