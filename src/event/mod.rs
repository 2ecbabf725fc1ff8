//! Event system for link notifications.
//!
//! Events report what the client sees outside of any single connection:
//! the link coming up or going down, packets no connection accepted, and
//! frames no connection type understands.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::types::Packet;

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The link was initialised.
    Connected,
    /// The link was shut down.
    Disconnected,
    /// A packet matched no open connection.
    Unrouted {
        con_type: &'static str,
        packet: Packet,
    },
    /// No connection type handles the frame's API identifier.
    UnknownFrame { identifier: u8, data: Bytes },
}

/// The kind of an [`Event`], for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Unrouted,
    UnknownFrame,
}

impl Event {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::Unrouted { .. } => EventKind::Unrouted,
            Self::UnknownFrame { .. } => EventKind::UnknownFrame,
        }
    }
}

/// Subscription filter for specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by event kind.
    pub kinds: Option<Vec<EventKind>>,
    /// Filter unrouted packets by connection type name.
    pub con_type: Option<&'static str>,
}

impl EventFilter {
    /// Creates a filter for specific event kinds.
    #[must_use]
    pub const fn kinds(kinds: Vec<EventKind>) -> Self {
        Self {
            kinds: Some(kinds),
            con_type: None,
        }
    }

    /// Creates a filter for unrouted packets of one connection type.
    #[must_use]
    pub fn unrouted(con_type: &'static str) -> Self {
        Self {
            kinds: Some(vec![EventKind::Unrouted]),
            con_type: Some(con_type),
        }
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }

        if let Some(expected) = self.con_type {
            let Event::Unrouted { con_type, .. } = event else {
                return false;
            };
            if *con_type != expected {
                return false;
            }
        }

        true
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
    filter: Option<EventFilter>,
}

impl Subscription {
    /// Receives the next matching event.
    ///
    /// Returns `None` once the dispatcher is gone. Events missed because
    /// the subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.as_ref().is_none_or(|f| f.matches(&event)) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("event subscriber lagged, {} events lost", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventDispatcher {
    /// Creates a dispatcher buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No subscribers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to events, optionally filtered.
    #[must_use]
    pub fn subscribe(&self, filter: Option<EventFilter>) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
            filter,
        }
    }

    /// Waits for an event matching the filter.
    ///
    /// Returns `None` if the timeout expires or the dispatcher is gone.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        let mut subscription = self.subscribe(Some(filter));
        tokio::time::timeout(timeout, subscription.recv())
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Addr16, ConAddress};

    fn unrouted(con_type: &'static str) -> Event {
        Event::Unrouted {
            con_type,
            packet: Packet {
                address: ConAddress::from(Addr16(3)),
                ..Packet::default()
            },
        }
    }

    #[tokio::test]
    async fn test_event_dispatch() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe(None);

        dispatcher.dispatch(Event::Connected);

        let event = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(Event::Connected));
    }

    #[test]
    fn test_kind_filter() {
        let filter = EventFilter::kinds(vec![EventKind::Connected, EventKind::Disconnected]);

        assert!(filter.matches(&Event::Connected));
        assert!(filter.matches(&Event::Disconnected));
        assert!(!filter.matches(&unrouted("16-bit Data")));
        assert!(EventFilter::default().matches(&unrouted("16-bit Data")));
    }

    #[test]
    fn test_unrouted_filter() {
        let filter = EventFilter::unrouted("16-bit Data");

        assert!(filter.matches(&unrouted("16-bit Data")));
        assert!(!filter.matches(&unrouted("64-bit Data")));
        assert!(!filter.matches(&Event::Connected));
    }

    #[tokio::test]
    async fn test_filtered_subscription_skips() {
        let dispatcher = EventDispatcher::default();
        let mut sub = dispatcher.subscribe(Some(EventFilter::kinds(vec![EventKind::UnknownFrame])));

        dispatcher.dispatch(Event::Connected);
        dispatcher.dispatch(Event::UnknownFrame {
            identifier: 0x90,
            data: Bytes::from_static(&[0x90, 0x01]),
        });

        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind(), EventKind::UnknownFrame);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_timeout() {
        let dispatcher = EventDispatcher::default();
        dispatcher.dispatch(Event::Connected);
        let event = dispatcher
            .wait_for(EventFilter::default(), Duration::from_secs(1))
            .await;
        assert!(event.is_none());
    }

    #[tokio::test]
    async fn test_recv_after_dispatcher_dropped() {
        let dispatcher = EventDispatcher::default();
        let mut sub = dispatcher.subscribe(None);
        drop(dispatcher);
        assert!(sub.recv().await.is_none());
    }
}
