//! Event broadcasting for pool lifecycle observability.
//!
//! Provides [`PoolEvent`] variants emitted during pool operations and an
//! [`EventBus`] backed by `tokio::sync::broadcast`. Delivery is
//! fire-and-forget: the pool never blocks on its observers.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::error::Error;
use crate::request::Origin;

// ---------------------------------------------------------------------------
// PoolEvent
// ---------------------------------------------------------------------------

/// Events emitted during pool operations.
///
/// `T` is the pooled resource value; subscribers receive cloned copies via
/// [`EventBus::subscribe`].
#[derive(Debug, Clone)]
pub enum PoolEvent<T> {
    /// An acquire request was accepted into the queue.
    RequestEnqueued {
        /// Call site of the acquire.
        origin: Origin,
    },
    /// An acquire request failed (rejection, timeout, or drain abort).
    ServeError {
        /// The error delivered to the requester.
        error: Error,
    },
    /// An acquire request was served with a resource.
    ServeSuccess {
        /// Call site of the acquire.
        origin: Origin,
        /// The value handed to the requester.
        value: T,
        /// How long the request waited in the queue.
        waited: Duration,
    },
    /// The factory produced a new resource.
    CreateSuccess {
        /// The freshly created value.
        value: T,
    },
    /// The factory failed to produce a resource.
    ///
    /// Creation errors are internal: acquire callers keep waiting and never
    /// observe them.
    CreateError {
        /// Stringified factory error.
        error: String,
    },
    /// A lent resource was returned to the pool.
    Released {
        /// The returned value.
        value: T,
    },
    /// A resource was handed to the factory for destruction.
    Destroyed {
        /// The value being destroyed.
        value: T,
    },
    /// A drain call observed the pool fully terminated.
    Drained,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast-based event bus for pool lifecycle events.
///
/// Uses `tokio::sync::broadcast` under the hood. Emission is fire-and-forget:
/// if no subscribers are listening or the channel is full, events are silently
/// dropped (no backpressure on the emitter).
pub struct EventBus<T> {
    sender: broadcast::Sender<PoolEvent<T>>,
}

impl<T: Clone> EventBus<T> {
    /// Create a new event bus with the given buffer size.
    ///
    /// The buffer size determines how many events can be queued before
    /// slow subscribers start lagging (and losing events).
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// This is non-blocking. If there are no subscribers, the event is
    /// silently dropped.
    pub fn emit(&self, event: PoolEvent<T>) {
        // Ignore the error — it just means there are no active receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events.
    ///
    /// Returns a receiver that will get all events emitted after this
    /// call. If the subscriber falls behind by more than `buffer_size`
    /// events, it will receive a `Lagged` error and skip to the latest.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent<T>> {
        self.sender.subscribe()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl<T> std::fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}
