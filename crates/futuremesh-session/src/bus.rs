//! Session events shared between sibling managers.
//!
//! Several managers can share one storage medium, the way browser tabs
//! share local storage. When one of them logs out, the others must follow.
//! The [`InvalidationBus`] carries that signal explicitly: every manager
//! publishes its session changes, and the siblings listening react.
//!
//! # Delivery
//!
//! Best-effort and last-write-wins. The bus is a bounded
//! `tokio::sync::broadcast` channel; a receiver that falls behind loses
//! the oldest events and continues from the newest ones. Nothing is
//! persisted, and a manager that wasn't listening when an event went
//! out never sees it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tracing::trace;

/// Counter for generating unique origin IDs.
static NEXT_ORIGIN_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies the manager that published an event, so a manager can
/// ignore its own echoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OriginId(u64);

impl OriginId {
    /// A process-unique origin.
    pub fn next() -> Self {
        Self(NEXT_ORIGIN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "origin-{}", self.0)
    }
}

/// A session change announced on the bus.
///
/// `generation` is the publishing manager's generation after the change.
/// It only orders events from the same origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The publisher established a session (login or registration).
    LoggedIn { origin: OriginId, generation: u64 },

    /// The publisher dropped its session and cleared the shared storage.
    Invalidated { origin: OriginId, generation: u64 },
}

impl SessionEvent {
    pub fn origin(&self) -> OriginId {
        match self {
            SessionEvent::LoggedIn { origin, .. } | SessionEvent::Invalidated { origin, .. } => {
                *origin
            }
        }
    }
}

/// A broadcast channel for [`SessionEvent`]s.
///
/// Cloning is cheap; clones publish into and subscribe to the same channel.
#[derive(Debug, Clone)]
pub struct InvalidationBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl InvalidationBus {
    /// Default number of buffered events per receiver.
    pub const DEFAULT_CAPACITY: usize = 16;

    /// Creates a bus buffering up to `capacity` events per receiver
    /// (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `event` to every current subscriber. With no subscribers the
    /// event is dropped.
    pub fn publish(&self, event: SessionEvent) {
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(?event, delivered, "session event published");
    }

    /// A receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[test]
    fn test_origin_ids_are_unique() {
        let a = OriginId::next();
        let b = OriginId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("origin-"));
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = InvalidationBus::default();
        bus.publish(SessionEvent::Invalidated {
            origin: OriginId::next(),
            generation: 1,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_every_subscriber_receives_event() {
        let bus = InvalidationBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.clone().subscribe();
        let origin = OriginId::next();

        bus.publish(SessionEvent::LoggedIn { origin, generation: 1 });

        assert_eq!(a.try_recv().unwrap().origin(), origin);
        assert_eq!(b.try_recv().unwrap().origin(), origin);
    }

    #[test]
    fn test_subscriber_only_sees_later_events() {
        let bus = InvalidationBus::default();
        let origin = OriginId::next();
        bus.publish(SessionEvent::LoggedIn { origin, generation: 1 });

        let mut rx = bus.subscribe();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_to_newest() {
        let bus = InvalidationBus::new(2);
        let mut rx = bus.subscribe();
        let origin = OriginId::next();

        for generation in 1..=5 {
            bus.publish(SessionEvent::Invalidated { origin, generation });
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Invalidated { origin, generation: 4 }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Invalidated { origin, generation: 5 }
        );
    }
}
