//! Acquire requests and the deadline-split request queue.
//!
//! Pending acquires live in one of two classes: *aging* requests carry a
//! deadline and are kept sorted by it (earliest at the head), *ageless*
//! requests have no deadline and are served strictly after the aging class,
//! in FIFO order.

use std::collections::VecDeque;
use std::fmt;
use std::panic::Location;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Origin
// ---------------------------------------------------------------------------

/// Captured call site of an acquire request.
///
/// Attached to every queued request and to every acquire error, so a timeout
/// observed deep in the maintainer can still name the line that asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin(&'static Location<'static>);

impl Origin {
    /// Capture the caller's location. The `#[track_caller]` chain starts at
    /// the public acquire entry points.
    #[track_caller]
    pub(crate) fn capture() -> Self {
        Self(Location::caller())
    }

    /// Source file of the acquire call
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.0.file()
    }

    /// Line of the acquire call
    #[must_use]
    pub fn line(&self) -> u32 {
        self.0.line()
    }

    /// Column of the acquire call
    #[must_use]
    pub fn column(&self) -> u32 {
        self.0.column()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.0.file(), self.0.line(), self.0.column())
    }
}

// ---------------------------------------------------------------------------
// Acquire options
// ---------------------------------------------------------------------------

/// Timeout selection for a single acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquireTimeout {
    /// Use the pool-wide default from [`PoolConfig`](crate::PoolConfig)
    #[default]
    Default,
    /// Wait indefinitely (an ageless request)
    Unbounded,
    /// Fail with a timeout error once this much time has passed
    After(Duration),
}

impl AcquireTimeout {
    /// Resolve against the pool default. `None` means the request is ageless.
    pub(crate) fn resolve(self, default: Option<Duration>) -> Option<Duration> {
        match self {
            Self::Default => default,
            Self::Unbounded => None,
            Self::After(timeout) => Some(timeout),
        }
    }
}

/// Per-request overrides for [`Pool::acquire_with`](crate::Pool::acquire_with).
#[derive(Debug, Clone, Copy, Default)]
pub struct AcquireOptions {
    /// Timeout override for this request
    pub timeout: AcquireTimeout,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One pending acquire. The completion sender fires exactly once, with
/// either a resource value or an acquire error.
pub(crate) struct Request<T> {
    pub(crate) origin: Origin,
    pub(crate) created_at: Instant,
    /// `Some` for aging requests, `None` for ageless ones.
    pub(crate) deadline: Option<Instant>,
    pub(crate) completion: oneshot::Sender<Result<T>>,
}

impl<T> Request<T> {
    /// The timeout this request was enqueued with (zero for ageless).
    pub(crate) fn timeout(&self) -> Duration {
        self.deadline
            .map(|deadline| deadline.duration_since(self.created_at))
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// RequestQueue
// ---------------------------------------------------------------------------

/// Pending acquires, split by deadline class.
pub(crate) struct RequestQueue<T> {
    /// Sorted by ascending deadline; ties keep enqueue order.
    aging: VecDeque<Request<T>>,
    /// Strict FIFO.
    ageless: VecDeque<Request<T>>,
}

impl<T> RequestQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            aging: VecDeque::new(),
            ageless: VecDeque::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.aging.len() + self.ageless.len()
    }

    /// Enqueue a request into its class. Aging requests are inserted after
    /// every queued request with an equal or earlier deadline, which keeps
    /// the deque sorted and ties in enqueue order.
    pub(crate) fn push(&mut self, request: Request<T>) {
        match request.deadline {
            Some(deadline) => {
                let at = self
                    .aging
                    .partition_point(|queued| queued.deadline <= Some(deadline));
                self.aging.insert(at, request);
            }
            None => self.ageless.push_back(request),
        }
    }

    /// Pop the head of the aging queue if its deadline has passed.
    pub(crate) fn pop_timed_out(&mut self, now: Instant) -> Option<Request<T>> {
        let due = self
            .aging
            .front()
            .is_some_and(|head| head.deadline.is_some_and(|deadline| now > deadline));
        if due {
            self.aging.pop_front()
        } else {
            None
        }
    }

    pub(crate) fn pop_aging(&mut self) -> Option<Request<T>> {
        self.aging.pop_front()
    }

    /// Put a just-popped aging head back. Only valid for the most recently
    /// popped head, which preserves the sort order.
    pub(crate) fn unpop_aging(&mut self, request: Request<T>) {
        self.aging.push_front(request);
    }

    pub(crate) fn pop_ageless(&mut self) -> Option<Request<T>> {
        self.ageless.pop_front()
    }

    pub(crate) fn unpop_ageless(&mut self, request: Request<T>) {
        self.ageless.push_front(request);
    }

    /// Remove every pending request, aging class first.
    pub(crate) fn drain_all(&mut self) -> Vec<Request<T>> {
        let mut requests: Vec<Request<T>> = self.aging.drain(..).collect();
        requests.extend(self.ageless.drain(..));
        requests
    }

    /// Deadlines of the aging class in queue order, for invariant checks.
    #[cfg(test)]
    pub(crate) fn aging_deadlines(&self) -> Vec<Instant> {
        self.aging.iter().filter_map(|r| r.deadline).collect()
    }
}
