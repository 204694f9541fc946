//! Replaying, ordered subscriptions over a published value.
//!
//! # Responsibility
//! - Hold the latest published value for late subscribers.
//! - Hand out observer handles that receive the value current at subscribe
//!   time first, then every later publication in order.
//!
//! # Invariants
//! - Snapshot and queue are taken under the same lock as `publish`, so a
//!   subscriber neither misses nor repeats a publication.
//! - Publications are never merged; each subscriber has its own queue.
//! - An unset publisher delivers nothing until its first publication.

use log::warn;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Per-subscriber queue depth before the oldest undelivered values are lost.
pub(crate) const SUBSCRIBER_BUFFER: usize = 64;

/// Publishing side of a live value.
#[derive(Debug)]
pub(crate) struct Publisher<T> {
    latest: Arc<Mutex<Option<T>>>,
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Publisher<T> {
    pub(crate) fn new(initial: Option<T>) -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            latest: Arc::new(Mutex::new(initial)),
            tx,
        }
    }

    fn latest(&self) -> MutexGuard<'_, Option<T>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn current(&self) -> Option<T> {
        self.latest().clone()
    }

    /// Stores `value` as the latest value and queues it for every subscriber.
    pub(crate) fn publish(&self, value: T) {
        let mut latest = self.latest();
        *latest = Some(value.clone());
        // No live subscribers is not an error; the value is still kept.
        let _ = self.tx.send(value);
    }

    pub(crate) fn subscribe(&self) -> Subscription<T> {
        let latest = self.latest();
        Subscription {
            snapshot: latest.clone(),
            rx: self.tx.subscribe(),
            latest: Arc::clone(&self.latest),
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Observer handle over a [`Publisher`].
///
/// Each call to the owner's `subscribe` yields a fresh handle, so a dropped
/// subscription can be restarted at any time.
#[derive(Debug)]
pub struct Subscription<T> {
    snapshot: Option<T>,
    rx: broadcast::Receiver<T>,
    latest: Arc<Mutex<Option<T>>>,
}

impl<T: Clone> Subscription<T> {
    /// Returns the latest published value without waiting, or `None` while
    /// unset.
    pub fn current(&self) -> Option<T> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits for the next value.
    ///
    /// The first call returns the value current at subscribe time, if any.
    /// Later calls return each publication in order. Returns `None` once the
    /// publisher has been dropped and the queue is drained.
    pub async fn next(&mut self) -> Option<T> {
        if let Some(value) = self.snapshot.take() {
            return Some(value);
        }

        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("event=subscription_lagged module=live status=degraded skipped={skipped}");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns whether `next` would resolve without waiting for a new
    /// publication.
    pub fn has_pending(&self) -> bool {
        self.snapshot.is_some() || !self.rx.is_empty()
    }
}
