use std::cell::Cell;
use std::rc::Rc;

use crate::reactive::Tracker;

/// Counts the computations currently reading from a cache.
///
/// A consumer is counted from the moment it tracks until the flush after
/// its invalidation settles. Releasing only happens when that consumer was
/// stopped, not merely rerun, and nobody else is still counted.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCounter {
    count: Rc<Cell<usize>>,
}

impl ReferenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.get()
    }

    /// Counts the current computation, if any.
    ///
    /// `on_release` runs after the flush following the computation's
    /// invalidation, provided the computation was stopped and the count has
    /// dropped to zero. Returns false outside a computation.
    pub fn track(&self, tracker: &Tracker, on_release: impl FnOnce() + 'static) -> bool {
        let Some(computation) = tracker.current() else {
            return false;
        };

        let count = self.count.get() + 1;
        self.count.set(count);
        tracing::trace!(computation = computation.id(), count, "Tracked cache consumer");

        let shared = self.count.clone();
        let tracker = tracker.clone();
        computation.on_invalidate(move |c| {
            let consumer = c.clone();
            tracker.after_flush(move || {
                let count = shared.get().saturating_sub(1);
                shared.set(count);
                tracing::trace!(computation = consumer.id(), count, "Released cache consumer");

                if count == 0 && consumer.is_stopped() {
                    on_release();
                }
            });
        });
        true
    }
}
