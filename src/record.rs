//! Per-resource bookkeeping records

use std::time::Duration;

use tokio::time::Instant;

use crate::request::Origin;

/// Bookkeeping record for one live resource.
///
/// The record's logical state (creating, free, lent, destroying) is not a
/// field: it is represented by which pool container currently holds the
/// record. Free records sit in the free list with `idle_at` set; lent
/// records sit in the lent list with `assigned_origin` set.
#[derive(Debug, Clone)]
pub struct ResourceRecord<T> {
    value: T,
    created_at: Instant,
    /// Fixed at creation; never refreshed by reuse.
    expires_at: Option<Instant>,
    /// Refreshed on every release; `None` while lent.
    idle_at: Option<Instant>,
    /// Call site of the serving acquire; `None` while free.
    assigned_origin: Option<Origin>,
}

impl<T> ResourceRecord<T> {
    pub(crate) fn new(value: T, expire_timeout: Option<Duration>) -> Self {
        let created_at = Instant::now();
        Self {
            value,
            created_at,
            expires_at: expire_timeout.and_then(|timeout| created_at.checked_add(timeout)),
            idle_at: None,
            assigned_origin: None,
        }
    }

    /// The caller-owned resource value
    pub fn value(&self) -> &T {
        &self.value
    }

    /// When the factory produced this resource
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Absolute expiry point, if an expire timeout is configured
    #[must_use]
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Most recent transition into the free list; `None` while lent
    #[must_use]
    pub fn idle_at(&self) -> Option<Instant> {
        self.idle_at
    }

    /// Call site of the acquire currently holding this resource
    #[must_use]
    pub fn assigned_origin(&self) -> Option<Origin> {
        self.assigned_origin
    }

    pub(crate) fn into_value(self) -> T {
        self.value
    }

    /// Transition into the free list: clear the serving back-pointer and
    /// refresh the idle clock.
    pub(crate) fn mark_idle(&mut self, now: Instant) {
        self.assigned_origin = None;
        self.idle_at = Some(now);
    }

    /// Transition into the lent list.
    pub(crate) fn mark_lent(&mut self, origin: Origin) {
        self.idle_at = None;
        self.assigned_origin = Some(origin);
    }

    pub(crate) fn idle_longer_than(&self, timeout: Duration, now: Instant) -> bool {
        self.idle_at
            .is_some_and(|idle_at| now.saturating_duration_since(idle_at) > timeout)
    }

    pub(crate) fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}
