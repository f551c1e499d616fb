//! Publish/subscribe signalling between engine instances
//!
//! Two channels exist: structured challenge mutations, and a generic
//! "this storage key changed" signal other instances use to recompute
//! derived state. Delivery is best-effort; nothing may depend on it for
//! correctness.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// What happened to a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeChange {
    /// A new challenge was created
    Created,
    /// Title, plan or break lengths changed
    Edited,
    /// The challenge reached its planned cycles or was closed by hand
    Completed,
    /// The challenge was removed
    Deleted,
}

/// Channel selector for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// [`Event::ChallengeChanged`]
    ChallengeMutation,
    /// [`Event::StorageSync`]
    StorageSync,
}

/// Payload published on the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "kebab-case")]
pub enum Event {
    /// A challenge was created, edited, completed or deleted
    ChallengeChanged {
        /// Kind of mutation
        kind: ChallengeChange,
        /// Challenge id
        id: String,
    },
    /// A persisted key was rewritten
    StorageSync {
        /// The key that changed
        key: String,
    },
}

impl Event {
    /// Channel this event is delivered on
    #[must_use]
    pub const fn channel(&self) -> Channel {
        match self {
            Self::ChallengeChanged { .. } => Channel::ChallengeMutation,
            Self::StorageSync { .. } => Channel::StorageSync,
        }
    }

    /// Shorthand for a storage-sync event
    #[must_use]
    pub fn storage_sync(key: &str) -> Self {
        Self::StorageSync {
            key: key.to_string(),
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked for each delivered event
pub type Handler = Box<dyn Fn(&Event) + Send + Sync>;

/// Event bus collaborator
pub trait EventBus: Send + Sync {
    /// Deliver an event to every subscriber of its channel
    fn publish(&self, event: Event);

    /// Register a handler on one channel
    fn subscribe(&self, channel: Channel, handler: Handler) -> SubscriptionId;

    /// Drop a handler. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Bus that drops everything, for running with the sync channel disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBus;

impl EventBus for NullBus {
    fn publish(&self, _event: Event) {}

    fn subscribe(&self, _channel: Channel, _handler: Handler) -> SubscriptionId {
        SubscriptionId(0)
    }

    fn unsubscribe(&self, _id: SubscriptionId) {}
}

/// Number of recent events [`LocalBus`] remembers
pub const PUBLISHED_LOG_LIMIT: usize = 256;

/// In-process bus; also keeps the most recent published events
#[derive(Default)]
pub struct LocalBus {
    next_id: AtomicU64,
    handlers: Mutex<BTreeMap<SubscriptionId, (Channel, Arc<Handler>)>>,
    published: Mutex<VecDeque<Event>>,
}

impl LocalBus {
    /// Create a bus with no subscribers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The last [`PUBLISHED_LOG_LIMIT`] events, oldest first
    #[must_use]
    pub fn published(&self) -> Vec<Event> {
        self.published
            .lock()
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().map_or(0, |handlers| handlers.len())
    }
}

impl EventBus for LocalBus {
    fn publish(&self, event: Event) {
        if let Ok(mut published) = self.published.lock() {
            if published.len() == PUBLISHED_LOG_LIMIT {
                published.pop_front();
            }
            published.push_back(event.clone());
        }

        // Snapshot the handlers so a handler may (un)subscribe re-entrantly.
        let targets: Vec<Arc<Handler>> = match self.handlers.lock() {
            Ok(handlers) => handlers
                .values()
                .filter(|(channel, _)| *channel == event.channel())
                .map(|(_, handler)| Arc::clone(handler))
                .collect(),
            Err(_) => {
                tracing::warn!("event bus lock poisoned; dropping event");
                return;
            }
        };

        for handler in targets {
            handler(&event);
        }
    }

    fn subscribe(&self, channel: Channel, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.insert(id, (channel, Arc::new(handler)));
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.remove(&id);
        }
    }
}
