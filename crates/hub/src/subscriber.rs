//! Subscriber handles and their outboxes.
//!
//! A [`Subscriber`] is the hub's side of one downstream connection: an
//! identity plus a bounded outbox sender. The connection's I/O task owns the
//! matching [`Outbox`] and drains it into the socket. Identity is by
//! [`SubscriberId`]; clones of a handle are the same subscriber.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, Notify};

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique subscriber identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Why one delivery attempt failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Connection task has gone away
    #[error("subscriber transport closed")]
    Closed,

    /// Outbox stayed full for the whole delivery window
    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),
}

/// Close flag shared by a subscriber handle and its outbox.
///
/// Once set it stays set, so a waiter that arrives late still sees it.
#[derive(Debug, Default)]
struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn wait(&self) {
        loop {
            // Register before checking the flag so a concurrent close is not missed
            let notified = self.notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

/// Hub-side handle for one downstream connection
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    outbox: mpsc::Sender<Arc<str>>,
    signal: Arc<CloseSignal>,
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Subscriber {
    /// Create a subscriber handle and the outbox its connection drains.
    ///
    /// `capacity` readings may be queued before delivery waits on the
    /// connection.
    pub fn channel(capacity: usize) -> (Subscriber, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let signal = Arc::new(CloseSignal::default());

        (
            Subscriber {
                id: SubscriberId::next(),
                outbox: tx,
                signal: Arc::clone(&signal),
            },
            Outbox {
                rx,
                signal,
                closed: false,
            },
        )
    }

    /// Subscriber identity
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Hand one serialized reading to the connection, waiting at most `timeout`.
    pub async fn deliver(&self, payload: Arc<str>, timeout: Duration) -> Result<(), DeliveryError> {
        self.outbox
            .send_timeout(payload, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Closed(_) => DeliveryError::Closed,
                SendTimeoutError::Timeout(_) => DeliveryError::TimedOut(timeout),
            })
    }

    /// Signal the connection task to stop. Permanent for every clone.
    pub(crate) fn close(&self) {
        self.signal.close();
    }

    /// True once the hub has closed this subscriber or its connection is gone.
    ///
    /// A closed subscriber can never be registered again.
    pub fn is_closed(&self) -> bool {
        self.signal.is_closed() || !self.is_connected()
    }

    /// True while the connection task still holds the outbox
    pub fn is_connected(&self) -> bool {
        !self.outbox.is_closed()
    }
}

/// Connection-side receiver for a [`Subscriber`]
#[derive(Debug)]
pub struct Outbox {
    rx: mpsc::Receiver<Arc<str>>,
    signal: Arc<CloseSignal>,
    closed: bool,
}

impl Outbox {
    /// Next payload to write, or `None` once the hub has closed this
    /// subscriber.
    pub async fn next(&mut self) -> Option<Arc<str>> {
        if self.closed {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.signal.wait() => {}
            payload = self.rx.recv() => return payload,
        }

        self.mark_closed();
        None
    }

    /// Resolves once the hub has closed this subscriber.
    ///
    /// Does not consume queued payloads, so it can be raced against a
    /// socket write that is still in progress.
    pub async fn closed(&self) {
        if !self.closed {
            self.signal.wait().await;
        }
    }

    /// Non-blocking variant of [`Outbox::next`].
    pub fn try_next(&mut self) -> Option<Arc<str>> {
        if self.closed {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// True once [`Outbox::next`] has observed the hub closing it
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn mark_closed(&mut self) {
        self.closed = true;
        self.rx.close();
    }
}
