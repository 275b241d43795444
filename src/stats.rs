//! Pool statistics snapshots

/// Point-in-time view of the pool, from [`Pool::stats`](crate::Pool::stats).
///
/// Gauges describe the population right now; `total_*` counters are
/// monotonic over the pool's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Resources in the free list, awaiting reuse.
    pub free: usize,
    /// Resources currently out with callers.
    pub lent: usize,
    /// Pending creations (including backoff cool-downs holding a slot).
    pub creating: usize,
    /// Pending destructions.
    pub destroying: usize,
    /// Queued acquire requests, both deadline classes.
    pub pending_requests: usize,
    /// Resources ever created.
    pub total_created: u64,
    /// Resources ever handed to the factory for destruction.
    pub total_destroyed: u64,
    /// Acquires ever served with a resource.
    pub total_acquisitions: u64,
    /// Releases ever accepted back.
    pub total_releases: u64,
    /// Acquires ever failed by deadline.
    pub total_timeouts: u64,
}

impl PoolStats {
    /// Live population: free + lent + creating + destroying.
    #[must_use]
    pub fn total(&self) -> usize {
        self.free + self.lent + self.creating + self.destroying
    }
}

/// Monotonic counters kept inside the pool core.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) created: u64,
    pub(crate) destroyed: u64,
    pub(crate) acquisitions: u64,
    pub(crate) releases: u64,
    pub(crate) timeouts: u64,
}
