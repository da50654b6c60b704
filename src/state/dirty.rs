//! Process-wide dirty tracking
//!
//! One tracker covers all community and member state. Instead of a bare
//! boolean it counts mutations, so a flush can clear exactly what it
//! wrote: anything mutated after the flush took its snapshot stays dirty.

use std::sync::atomic::{AtomicU64, Ordering};

/// Mutation generation captured before a snapshot is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirtyMark(u64);

/// Marks in-memory state as diverging from the durable store
#[derive(Debug, Default)]
pub struct DirtyTracker {
    /// Bumped on every mutation
    mutations: AtomicU64,
    /// Highest generation confirmed durable
    persisted: AtomicU64,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag state as needing a durable write
    pub fn mark(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether any mutation has not been confirmed durable yet
    pub fn is_dirty(&self) -> bool {
        self.mutations.load(Ordering::SeqCst) > self.persisted.load(Ordering::SeqCst)
    }

    /// Capture the current generation. Must be taken before the snapshot.
    pub fn begin(&self) -> DirtyMark {
        DirtyMark(self.mutations.load(Ordering::SeqCst))
    }

    /// Clear everything up to `mark`. Only call after a confirmed commit.
    pub fn clear(&self, mark: DirtyMark) {
        self.persisted.fetch_max(mark.0, Ordering::SeqCst);
    }

    /// Forget all pending mutations (state was just loaded from the store)
    pub fn reset(&self) {
        let current = self.mutations.load(Ordering::SeqCst);
        self.persisted.fetch_max(current, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_clean() {
        let tracker = DirtyTracker::new();
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn test_mark_and_clear() {
        let tracker = DirtyTracker::new();
        tracker.mark();
        assert!(tracker.is_dirty());

        let mark = tracker.begin();
        tracker.clear(mark);
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn test_mutation_during_flush_stays_dirty() {
        let tracker = DirtyTracker::new();
        tracker.mark();
        let mark = tracker.begin();

        // Mutation lands while the flush is writing
        tracker.mark();

        tracker.clear(mark);
        assert!(tracker.is_dirty());
    }

    #[test]
    fn test_failed_flush_leaves_flag_set() {
        let tracker = DirtyTracker::new();
        tracker.mark();
        let _mark = tracker.begin();
        // No clear: the write failed
        assert!(tracker.is_dirty());
    }

    #[test]
    fn test_stale_clear_does_not_regress() {
        let tracker = DirtyTracker::new();
        tracker.mark();
        let early = tracker.begin();
        tracker.mark();
        let late = tracker.begin();

        tracker.clear(late);
        tracker.clear(early);
        assert!(!tracker.is_dirty());
    }
}
