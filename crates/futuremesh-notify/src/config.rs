//! Notification polling settings.

use std::time::Duration;

/// How often to poll and how much of the feed to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Time between two fetches of the feed. Zero disables the periodic
    /// fetch; the first fetch still happens.
    pub poll_interval: Duration,

    /// How many of the newest notifications a UI shows at once.
    pub max_visible: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_visible: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_config_default() {
        let config = NotifyConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.max_visible, 5);
    }
}
