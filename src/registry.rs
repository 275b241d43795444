//! Resource registry: population accounting across the four states.
//!
//! Free and lent records are held in ordered containers; creating and
//! destroying populations exist only as counters (their records are owned
//! by in-flight factory tasks). `total()` is the single source of truth
//! for every admission decision.

use std::collections::VecDeque;

use crate::record::ResourceRecord;

pub(crate) struct Registry<T> {
    /// Serve order: popped from the front, pushed to the back on release,
    /// so the oldest release is reused first.
    pub(crate) free: VecDeque<ResourceRecord<T>>,
    /// Records currently out with callers, in lend order.
    pub(crate) lent: Vec<ResourceRecord<T>>,
    pub(crate) creating: usize,
    pub(crate) destroying: usize,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            free: VecDeque::new(),
            lent: Vec::new(),
            creating: 0,
            destroying: 0,
        }
    }

    pub(crate) fn total(&self) -> usize {
        self.free.len() + self.lent.len() + self.creating + self.destroying
    }

    /// Remove the most recently lent record matching `matches`.
    ///
    /// Searching from the newest insertion backwards means that if a caller
    /// manages to lend two equal values, the later one wins; duplicate
    /// values are the caller's error but must not corrupt accounting.
    pub(crate) fn remove_lent_by(
        &mut self,
        mut matches: impl FnMut(&T) -> bool,
    ) -> Option<ResourceRecord<T>> {
        let at = self.lent.iter().rposition(|record| matches(record.value()))?;
        Some(self.lent.remove(at))
    }

    /// Remove the most recently freed record matching `matches`.
    pub(crate) fn remove_free_by(
        &mut self,
        mut matches: impl FnMut(&T) -> bool,
    ) -> Option<ResourceRecord<T>> {
        let at = self.free.iter().rposition(|record| matches(record.value()))?;
        self.free.remove(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn record(value: u32) -> ResourceRecord<u32> {
        ResourceRecord::new(value, None)
    }

    #[test]
    fn total_counts_all_four_states() {
        let mut registry = Registry::new();
        assert_eq!(registry.total(), 0);

        let mut free = record(1);
        free.mark_idle(Instant::now());
        registry.free.push_back(free);
        registry.lent.push(record(2));
        registry.creating = 3;
        registry.destroying = 2;
        assert_eq!(registry.total(), 7);
    }

    #[test]
    fn lookup_prefers_the_newest_duplicate() {
        let mut registry = Registry::new();
        let older = record(5);
        let older_created = older.created_at();
        registry.lent.push(older);
        let newer = record(5);
        registry.lent.push(newer);

        let found = registry
            .remove_lent_by(|value| *value == 5)
            .expect("a duplicate matches");
        assert!(found.created_at() >= older_created);
        assert_eq!(registry.lent.len(), 1);
        assert_eq!(registry.lent[0].created_at(), older_created);
    }

    #[test]
    fn lookup_misses_return_none_and_leave_state_alone() {
        let mut registry = Registry::new();
        registry.lent.push(record(1));
        assert!(registry.remove_lent_by(|value| *value == 9).is_none());
        assert!(registry.remove_free_by(|value| *value == 1).is_none());
        assert_eq!(registry.total(), 1);
    }

    #[test]
    fn free_removal_searches_from_the_back() {
        let mut registry = Registry::new();
        for value in [1, 2, 1] {
            let mut r = record(value);
            r.mark_idle(Instant::now());
            registry.free.push_back(r);
        }
        let removed = registry
            .remove_free_by(|value| *value == 1)
            .expect("present");
        assert_eq!(*removed.value(), 1);
        // The front duplicate (oldest release) is still first in serve order.
        assert_eq!(*registry.free[0].value(), 1);
        assert_eq!(*registry.free[1].value(), 2);
        assert_eq!(registry.free.len(), 2);
    }
}
