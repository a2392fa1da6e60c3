//! The navigation seam: where the session manager sends the user after
//! login and logout.
//!
//! In a browser this is `window.location`. A CLI or a test has no
//! location bar, so [`MemoryNavigator`] just remembers the current path
//! and every path it was sent to.

use parking_lot::Mutex;
use tracing::debug;

/// Reads and changes the user's current location.
///
/// ## Trait bounds
///
/// - `Send + Sync + 'static` → the manager shares one navigator with its
///   background tasks, and a 401 inside any of them may navigate.
///
/// Both methods are synchronous so that logout stays synchronous.
pub trait Navigator: Send + Sync + 'static {
    /// The path the user is on now, e.g. `/dashboard`.
    fn current_path(&self) -> String;

    /// Moves the user to `path`.
    fn navigate(&self, path: &str);
}

/// A navigator with no UI behind it.
#[derive(Debug)]
pub struct MemoryNavigator {
    current: Mutex<String>,
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    /// Starts on `path` with an empty history.
    pub fn new(path: &str) -> Self {
        Self {
            current: Mutex::new(path.to_string()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Every path passed to [`navigate`](Navigator::navigate), oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.current.lock().clone()
    }

    fn navigate(&self, path: &str) {
        debug!(path, "navigating");
        *self.current.lock() = path.to_string();
        self.history.lock().push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_updates_current_and_history() {
        let nav = MemoryNavigator::new("/login");
        nav.navigate("/dashboard");
        nav.navigate("/profile");

        assert_eq!(nav.current_path(), "/profile");
        assert_eq!(nav.history(), vec!["/dashboard", "/profile"]);
    }

    #[test]
    fn test_default_starts_at_root() {
        let nav = MemoryNavigator::default();
        assert_eq!(nav.current_path(), "/");
        assert!(nav.history().is_empty());
    }
}
