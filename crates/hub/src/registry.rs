//! Subscriber registry.
//!
//! The set of live subscribers, keyed by identity. Every mutation and every
//! snapshot goes through one mutex; callers never hold it across delivery.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::subscriber::{Subscriber, SubscriberId};

/// Live subscriber set
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Returns `false` if it was already present or has
    /// already been closed.
    pub async fn register(&self, subscriber: Subscriber) -> bool {
        let mut subscribers = self.subscribers.lock().await;
        let id = subscriber.id();
        if subscribers.contains_key(&id) {
            return false;
        }
        // Checked under the lock: evict closes while holding it
        if subscriber.is_closed() {
            debug!(subscriber = %id, "Refusing to register closed subscriber");
            return false;
        }
        subscribers.insert(id, subscriber);
        info!(subscriber = %id, total = subscribers.len(), "Subscriber registered");
        true
    }

    /// Remove a subscriber. Returns `false` if it was not present.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().await;
        let removed = subscribers.remove(&id).is_some();
        if removed {
            info!(subscriber = %id, total = subscribers.len(), "Subscriber unregistered");
        }
        removed
    }

    /// Remove a subscriber and close its transport in one step.
    ///
    /// Returns `false` if it was already gone, in which case nothing is
    /// closed.
    pub async fn evict(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock().await;
        match subscribers.remove(&id) {
            Some(subscriber) => {
                subscriber.close();
                info!(subscriber = %id, total = subscribers.len(), "Subscriber evicted");
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the current members
    pub async fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.lock().await.values().cloned().collect()
    }

    /// Whether `id` is currently registered
    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.lock().await.contains_key(&id)
    }

    /// Number of registered subscribers
    pub async fn len(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// True when nobody is subscribed
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
