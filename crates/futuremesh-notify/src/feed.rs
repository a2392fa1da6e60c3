//! The notification feed shown to the user.

use futuremesh_protocol::{Notification, NotificationList, RecordId};

/// A fetched notification list, newest first, with its unread count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

impl NotificationFeed {
    /// Builds a feed from a server response. The server already orders
    /// the list newest first.
    pub fn new(notifications: Vec<Notification>) -> Self {
        let unread_count = notifications.iter().filter(|n| !n.is_read).count();
        Self {
            notifications,
            unread_count,
        }
    }

    /// The newest `max` notifications.
    pub fn visible(&self, max: usize) -> &[Notification] {
        &self.notifications[..self.notifications.len().min(max)]
    }

    /// Notifications not yet marked read.
    pub fn unread(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter().filter(|n| !n.is_read)
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    /// Marks `id` read locally, e.g. after the server confirmed it.
    /// Returns `false` if the feed has no such entry or it was already read.
    pub fn mark_read(&mut self, id: &RecordId) -> bool {
        let Some(entry) = self.notifications.iter_mut().find(|n| &n.id == id) else {
            return false;
        };
        if entry.is_read {
            return false;
        }
        entry.is_read = true;
        self.unread_count -= 1;
        true
    }
}

impl From<NotificationList> for NotificationFeed {
    fn from(list: NotificationList) -> Self {
        Self::new(list.notifications)
    }
}
