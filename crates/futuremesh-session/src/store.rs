//! Durable storage for the access token and the profile snapshot.
//!
//! Two layers:
//!
//! - [`StorageBackend`]: a raw string key/value medium. [`MemoryBackend`]
//!   for tests and throwaway sessions, [`FileBackend`] for a JSON file on
//!   disk (the CLI's equivalent of browser local storage).
//! - [`SessionStore`]: typed, namespaced accessors on top of a backend.
//!   It never returns an error: reads fail closed to `None`, writes report
//!   `false`, and the reason is logged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futuremesh_protocol::{Codec, JsonCodec, UserProfile};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::SessionError;

/// Key suffix for the bearer token.
pub(crate) const TOKEN_KEY: &str = "access_token";
/// Key suffix for the profile snapshot.
pub(crate) const USER_KEY: &str = "user_data";

// ---------------------------------------------------------------------------
// StorageBackend
// ---------------------------------------------------------------------------

/// A string key/value medium.
///
/// Implementations are synchronous: the data is tiny and the session
/// manager calls them while holding its state lock, so the durable copy
/// and the in-memory copy change together.
pub trait StorageBackend: Send + Sync + 'static {
    /// Returns the stored value, or `None` if the key is absent.
    fn read(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), SessionError>;
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// An in-process backend. Clones share the same entries, which is how
/// sibling managers in tests see one "browser profile".
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
    /// Maximum total bytes of stored values, if any.
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that refuses writes once the stored values would exceed
    /// `bytes` in total, like a full browser storage quota.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            entries: Arc::default(),
            quota: Some(bytes),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if others + value.len() > quota {
                return Err(SessionError::Storage(format!(
                    "quota of {quota} bytes exceeded writing {key}"
                )));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileBackend
// ---------------------------------------------------------------------------

/// A backend persisting all keys as one JSON object in a file.
///
/// Every operation re-reads the file, so two processes pointed at the
/// same path see each other's writes. The file is created with `0600`
/// permissions on unix since it holds a bearer token.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Arc<Mutex<()>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::default(),
        }
    }

    /// `~/.futuremesh/session.json`, or under `/tmp` when `HOME` is unset.
    pub fn default_path() -> PathBuf {
        let home = match std::env::var("HOME") {
            Ok(h) => h,
            Err(_) => {
                warn!("HOME not set, using /tmp for the session file");
                "/tmp".to_string()
            }
        };
        PathBuf::from(home).join(".futuremesh").join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, SessionError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "reading {}: {e}",
                    self.path.display()
                )));
            }
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            SessionError::Storage(format!("parsing {}: {e}", self.path.display()))
        })
    }

    fn save(&self, entries: &Map<String, Value>) -> Result<(), SessionError> {
        let storage_err = |what: &str, e: &dyn std::fmt::Display| {
            SessionError::Storage(format!("{what} {}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| storage_err("creating directory for", &e))?;
            }
        }

        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| storage_err("serializing", &e))?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .map_err(|e| storage_err("opening", &e))?;
            file.write_all(contents.as_bytes())
                .map_err(|e| storage_err("writing", &e))?;
            file.sync_all().map_err(|e| storage_err("syncing", &e))?;
        }
        #[cfg(not(unix))]
        {
            std::fs::write(&self.path, &contents).map_err(|e| storage_err("writing", &e))?;
        }

        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, SessionError> {
        let _guard = self.lock.lock();
        Ok(self
            .load()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        entries.insert(key.to_string(), Value::String(value.to_string()));
        self.save(&entries)
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Typed, namespaced access to a [`StorageBackend`].
///
/// Keys passed to [`get`](Self::get), [`set`](Self::set) and
/// [`remove`](Self::remove) are prefixed with the namespace:
/// `access_token` in namespace `futuremesh` is stored as
/// `futuremesh_access_token`.
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
    codec: JsonCodec,
    namespace: String,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(backend: impl StorageBackend, namespace: &str) -> Self {
        Self::from_arc(Arc::new(backend), namespace)
    }

    /// Builds a store over a backend that is already shared.
    pub fn from_arc(backend: Arc<dyn StorageBackend>, namespace: &str) -> Self {
        Self {
            backend,
            codec: JsonCodec,
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The full storage key for `name`.
    pub fn key(&self, name: &str) -> String {
        format!("{}_{name}", self.namespace)
    }

    /// Reads and decodes `key`. Returns `None` if the key is absent, the
    /// medium fails, or the stored value doesn't decode as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full = self.key(key);
        let raw = match self.backend.read(&full) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %full, error = %e, "storage read failed");
                return None;
            }
        };
        match self.codec.decode(raw.as_bytes()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %full, error = %e, "discarding undecodable stored value");
                None
            }
        }
    }

    /// Encodes and writes `value` under `key`. Returns `false` if encoding
    /// or the medium fails.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let full = self.key(key);
        let encoded = match self.codec.encode_string(value) {
            Ok(s) => s,
            Err(e) => {
                warn!(key = %full, error = %e, "could not encode value for storage");
                return false;
            }
        };
        match self.backend.write(&full, &encoded) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %full, error = %e, "storage write failed");
                false
            }
        }
    }

    /// Deletes `key`. Idempotent.
    pub fn remove(&self, key: &str) {
        let full = self.key(key);
        if let Err(e) = self.backend.delete(&full) {
            warn!(key = %full, error = %e, "storage delete failed");
        }
    }

    // -- credential pair ----------------------------------------------------

    pub fn token(&self) -> Option<String> {
        self.get(TOKEN_KEY)
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.get(USER_KEY)
    }

    /// Both halves of the persisted session, or `None` unless both are present.
    pub fn load_credentials(&self) -> Option<(String, UserProfile)> {
        let token = self.token().filter(|t| !t.is_empty())?;
        let user = self.user()?;
        Some((token, user))
    }

    /// Writes the token and the profile together.
    ///
    /// If either write fails, both keys are put back to what they held
    /// before the call and `false` is returned.
    pub fn save_credentials(&self, token: &str, user: &UserProfile) -> bool {
        let token_key = self.key(TOKEN_KEY);
        let user_key = self.key(USER_KEY);
        let previous_token = self.backend.read(&token_key).ok().flatten();
        let previous_user = self.backend.read(&user_key).ok().flatten();

        if self.set(TOKEN_KEY, token) && self.set(USER_KEY, user) {
            debug!(namespace = %self.namespace, "credentials saved");
            return true;
        }

        warn!(namespace = %self.namespace, "credential save failed, rolling back");
        self.restore_raw(&token_key, previous_token.as_deref());
        self.restore_raw(&user_key, previous_user.as_deref());
        false
    }

    /// Replaces the profile snapshot, leaving the token alone.
    pub fn save_user(&self, user: &UserProfile) -> bool {
        self.set(USER_KEY, user)
    }

    /// Replaces the token, leaving the profile alone.
    pub fn save_token(&self, token: &str) -> bool {
        self.set(TOKEN_KEY, token)
    }

    /// Removes both halves of the persisted session.
    pub fn clear_credentials(&self) {
        self.remove(TOKEN_KEY);
        self.remove(USER_KEY);
    }

    fn restore_raw(&self, key: &str, previous: Option<&str>) {
        let result = match previous {
            Some(raw) => self.backend.write(key, raw),
            None => self.backend.delete(key),
        };
        if let Err(e) = result {
            warn!(key, error = %e, "rollback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futuremesh_protocol::Role;

    fn profile() -> UserProfile {
        let mut user = UserProfile::new(1u64, "a@b.com", Role::Student);
        user.extra.insert("first_name".into(), Value::from("Ada"));
        user.extra.insert("skills".into(), serde_json::json!(["rust", "sql"]));
        user
    }

    fn store() -> (MemoryBackend, SessionStore) {
        let backend = MemoryBackend::new();
        let store = SessionStore::new(backend.clone(), "futuremesh");
        (backend, store)
    }

    // =====================================================================
    // get / set / remove
    // =====================================================================

    #[test]
    fn test_set_then_get_returns_equal_profile() {
        let (_, store) = store();
        let user = profile();

        assert!(store.set("user_data", &user));
        let loaded: UserProfile = store.get("user_data").expect("should load");

        assert_eq!(loaded, user);
    }

    #[test]
    fn test_keys_are_namespaced() {
        let (backend, store) = store();
        store.set("access_token", "T1");

        assert_eq!(
            backend.read("futuremesh_access_token").unwrap().as_deref(),
            Some(r#""T1""#)
        );
        assert_eq!(backend.read("access_token").unwrap(), None);
    }

    #[test]
    fn test_get_missing_key_returns_none() {
        let (_, store) = store();
        assert_eq!(store.get::<String>("nothing"), None);
    }

    #[test]
    fn test_get_undecodable_value_returns_none() {
        let (backend, store) = store();
        backend.write("futuremesh_user_data", "{not json").unwrap();

        assert_eq!(store.get::<UserProfile>("user_data"), None);
    }

    #[test]
    fn test_get_wrong_shape_returns_none() {
        let (_, store) = store();
        store.set("user_data", &serde_json::json!({"id": 1, "role": "janitor"}));

        assert_eq!(store.user(), None);
    }

    #[test]
    fn test_set_over_quota_returns_false() {
        let store = SessionStore::new(MemoryBackend::with_quota(4), "futuremesh");
        assert!(store.set("access_token", "T1"));
        assert!(!store.set("user_data", &profile()));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (backend, store) = store();
        store.set("access_token", "T1");

        store.remove("access_token");
        store.remove("access_token");

        assert!(backend.is_empty());
    }

    // =====================================================================
    // Credential pair
    // =====================================================================

    #[test]
    fn test_save_and_load_credentials() {
        let (backend, store) = store();

        assert!(store.save_credentials("T1", &profile()));

        assert_eq!(backend.len(), 2);
        let (token, user) = store.load_credentials().expect("both present");
        assert_eq!(token, "T1");
        assert_eq!(user.role, Role::Student);
    }

    #[test]
    fn test_load_credentials_requires_both_halves() {
        let (_, store) = store();
        store.set("access_token", "T1");
        assert!(store.load_credentials().is_none());

        store.clear_credentials();
        store.set("user_data", &profile());
        assert!(store.load_credentials().is_none());
    }

    #[test]
    fn test_save_credentials_rolls_back_on_partial_failure() {
        let backend = MemoryBackend::with_quota(8);
        let store = SessionStore::new(backend.clone(), "futuremesh");

        assert!(!store.save_credentials("T1", &profile()));

        assert!(backend.is_empty(), "token must not survive without its profile");
        assert!(store.token().is_none());
    }

    #[test]
    fn test_save_credentials_rollback_restores_previous_pair() {
        let backend = MemoryBackend::with_quota(200);
        let store = SessionStore::new(backend.clone(), "futuremesh");
        let small = UserProfile::new(1u64, "a@b.com", Role::Student);
        assert!(store.save_credentials("T1", &small));

        let mut huge = small.clone();
        huge.extra.insert("bio".into(), Value::from("x".repeat(500)));
        assert!(!store.save_credentials("T2", &huge));

        let (token, user) = store.load_credentials().expect("old pair intact");
        assert_eq!(token, "T1");
        assert_eq!(user, small);
    }

    #[test]
    fn test_clear_credentials_removes_both() {
        let (backend, store) = store();
        store.save_credentials("T1", &profile());

        store.clear_credentials();

        assert!(backend.is_empty());
        assert!(store.token().is_none());
        assert!(store.user().is_none());
    }

    // =====================================================================
    // FileBackend
    // =====================================================================

    #[test]
    fn test_file_backend_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = SessionStore::new(FileBackend::new(&path), "futuremesh");
        assert!(store.save_credentials("T1", &profile()));

        let reopened = SessionStore::new(FileBackend::new(&path), "futuremesh");
        let (token, user) = reopened.load_credentials().expect("should reload");
        assert_eq!(token, "T1");
        assert_eq!(user, profile());
    }

    #[test]
    fn test_file_backend_missing_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("absent.json"));
        assert_eq!(backend.read("anything").unwrap(), None);
        backend.delete("anything").unwrap();
    }

    #[test]
    fn test_file_backend_corrupt_file_fails_closed_in_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "garbage").unwrap();

        let backend = FileBackend::new(&path);
        assert!(matches!(backend.read("k"), Err(SessionError::Storage(_))));

        let store = SessionStore::new(backend, "futuremesh");
        assert!(store.token().is_none());
    }

    #[test]
    fn test_file_backend_delete_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("session.json"));
        backend.write("a", "1").unwrap();
        backend.write("b", "2").unwrap();

        backend.delete("a").unwrap();

        assert_eq!(backend.read("a").unwrap(), None);
        assert_eq!(backend.read("b").unwrap().as_deref(), Some("2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_backend_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        FileBackend::new(&path).write("k", "v").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
