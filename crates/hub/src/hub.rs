//! Fan-out hub.
//!
//! `broadcast` snapshots the registry under its lock, releases the lock and
//! delivers to every target concurrently. Each delivery is bounded by the
//! delivery timeout. A target that fails is evicted; nothing else is
//! affected and the caller never sees the error.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use telemetry_core::{HubConfig, Reading};
use tracing::{debug, error, warn};

use crate::registry::SubscriberRegistry;
use crate::subscriber::{DeliveryError, Outbox, Subscriber, SubscriberId};

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Target
    pub subscriber: SubscriberId,
    /// What happened
    pub result: Result<(), DeliveryError>,
}

/// Aggregated result of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers in the snapshot
    pub targets: usize,
    /// Successful deliveries
    pub delivered: usize,
    /// Subscribers evicted by this broadcast, with the reason
    pub dropped: Vec<(SubscriberId, DeliveryError)>,
}

impl BroadcastReport {
    fn from_outcomes(outcomes: Vec<DeliveryOutcome>) -> Self {
        let mut report = BroadcastReport {
            targets: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome.result {
                Ok(()) => report.delivered += 1,
                Err(e) => report.dropped.push((outcome.subscriber, e)),
            }
        }
        report
    }
}

/// Shared fan-out hub
#[derive(Debug)]
pub struct FanOutHub {
    pub(crate) registry: SubscriberRegistry,
    delivery_timeout: Duration,
}

impl FanOutHub {
    /// Create a hub with the given per-delivery bound
    pub fn new(delivery_timeout: Duration) -> Self {
        Self {
            registry: SubscriberRegistry::new(),
            delivery_timeout,
        }
    }

    /// Create a hub from the `[hub]` config section
    pub fn from_config(config: &HubConfig) -> Self {
        Self::new(config.delivery_timeout())
    }

    /// Per-delivery bound
    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    /// Add a subscriber; a no-op if it is already registered or closed.
    pub async fn register(&self, subscriber: Subscriber) {
        if !self.registry.register(subscriber).await {
            debug!("Registration ignored");
        }
    }

    /// Create a subscriber, register it and return the connection's outbox
    /// together with the handle used to unregister later.
    pub async fn subscribe(&self, outbox_capacity: usize) -> (Subscriber, Outbox) {
        let (subscriber, outbox) = Subscriber::channel(outbox_capacity);
        self.register(subscriber.clone()).await;
        (subscriber, outbox)
    }

    /// Remove a subscriber if present. Does not close its transport.
    pub async fn unregister(&self, subscriber: &Subscriber) {
        self.registry.unregister(subscriber.id()).await;
    }

    /// Whether the subscriber is currently registered
    pub async fn contains(&self, subscriber: &Subscriber) -> bool {
        self.registry.contains(subscriber.id()).await
    }

    /// Number of registered subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.registry.len().await
    }

    /// Deliver `reading` to every subscriber registered at snapshot time.
    ///
    /// Returns once every attempt has succeeded, failed or timed out.
    /// Failed subscribers have been evicted by the time this returns.
    pub async fn broadcast(&self, reading: &Reading) -> BroadcastReport {
        let payload: Arc<str> = match reading.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!(sensor_id = %reading.sensor_id, error = %e, "Failed to serialize reading");
                return BroadcastReport::default();
            }
        };

        let targets = self.registry.snapshot().await;
        if targets.is_empty() {
            return BroadcastReport::default();
        }

        let timeout = self.delivery_timeout;
        let outcomes = join_all(targets.iter().map(|subscriber| {
            let payload = Arc::clone(&payload);
            async move {
                DeliveryOutcome {
                    subscriber: subscriber.id(),
                    result: subscriber.deliver(payload, timeout).await,
                }
            }
        }))
        .await;

        let report = BroadcastReport::from_outcomes(outcomes);
        for (id, reason) in &report.dropped {
            warn!(subscriber = %id, reason = %reason, "Delivery failed, dropping subscriber");
            self.registry.evict(*id).await;
        }

        debug!(
            sensor_id = %reading.sensor_id,
            targets = report.targets,
            delivered = report.delivered,
            dropped = report.dropped.len(),
            "Broadcast complete"
        );
        report
    }
}

impl Default for FanOutHub {
    fn default() -> Self {
        Self::from_config(&HubConfig::default())
    }
}
