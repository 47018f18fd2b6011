//! Telemetry Hub - fan-out of sensor readings to live subscribers
//!
//! This crate provides:
//! - [`Subscriber`] handles and the connection-side [`Outbox`]
//! - the [`SubscriberRegistry`], a mutex-guarded live set
//! - [`FanOutHub::broadcast`], snapshot-then-deliver with per-target
//!   timeouts and eviction on failure
//! - a WebSocket server that turns each connection into a subscriber
//!
//! # Examples
//!
//! ```no_run
//! use telemetry_core::Reading;
//! use telemetry_hub::FanOutHub;
//!
//! # async fn demo() {
//! let hub = FanOutHub::default();
//! let (_subscriber, mut outbox) = hub.subscribe(16).await;
//!
//! hub.broadcast(&Reading::new("sensor-0", 20.1, 101.0, 42.5)).await;
//! let json = outbox.next().await;
//! # }
//! ```

#![warn(missing_docs)]

pub mod access;
pub mod hub;
pub mod registry;
pub mod subscriber;
pub mod websocket;

pub use access::OriginPolicy;
pub use hub::{BroadcastReport, DeliveryOutcome, FanOutHub};
pub use registry::SubscriberRegistry;
pub use subscriber::{DeliveryError, Outbox, Subscriber, SubscriberId};
pub use websocket::{WsError, WsServer};
