// In-process publish/subscribe hub
//
// Decision: Subscribers are snapshotted before each emission so concurrent
// subscribe/unsubscribe calls never corrupt in-flight dispatch. Subscribers
// added or removed during an emission are not guaranteed to observe it.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::event::Event;
use crate::pattern::matches_any;

/// Callback invoked for every matching emitted event
pub type SubscriberFn = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque id returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    patterns: Vec<String>,
    callback: SubscriberFn,
}

/// In-process publish/subscribe hub over the event stream
///
/// Cloning the bus shares the subscriber set.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback with a glob-style filter
    ///
    /// An empty pattern list matches nothing; pass `["*"]` to observe every
    /// event.
    pub fn subscribe(
        &self,
        patterns: impl IntoIterator<Item = impl Into<String>>,
        callback: SubscriberFn,
    ) -> SubscriptionId {
        let id = SubscriptionId(Uuid::now_v7());
        let subscriber = Subscriber {
            id,
            patterns: patterns.into_iter().map(Into::into).collect(),
            callback,
        };
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .push(subscriber);
        id
    }

    /// Remove a subscription; unknown ids are a no-op
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .retain(|s| s.id != id);
    }

    /// Invoke every currently-registered subscriber whose filter matches
    pub fn emit(&self, event: &Event) {
        // Snapshot under the lock, dispatch outside it
        let snapshot: Vec<Subscriber> = self
            .subscribers
            .lock()
            .expect("event bus lock poisoned")
            .clone();

        for subscriber in snapshot {
            if matches_any(&subscriber.patterns, &event.name) {
                (subscriber.callback)(event);
            }
        }
    }

    /// Number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("event bus lock poisoned")
            .len()
    }
}
