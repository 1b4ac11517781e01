use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use super::computation::Computation;

type AfterFlush = Box<dyn FnOnce()>;

/// Reruns allowed in one flush before it gives up.
pub(crate) const MAX_FLUSH_RERUNS: usize = 1000;

#[derive(Default)]
pub(crate) struct TrackerInner {
    current: RefCell<Option<Computation>>,
    pending: RefCell<VecDeque<Computation>>,
    after_flush: RefCell<VecDeque<AfterFlush>>,
    flushing: Cell<bool>,
    next_id: Cell<u64>,
}

/// Handle to one reactive scheduler. Cloning shares the scheduler.
#[derive(Clone, Default)]
pub struct Tracker {
    pub(crate) inner: Rc<TrackerInner>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("active", &self.active())
            .field("pending", &self.inner.pending.borrow().len())
            .field("after_flush", &self.inner.after_flush.borrow().len())
            .finish()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_inner(inner: Rc<TrackerInner>) -> Self {
        Self { inner }
    }

    /// True while a computation is running.
    pub fn active(&self) -> bool {
        self.inner.current.borrow().is_some()
    }

    /// The computation currently running, if any.
    pub fn current(&self) -> Option<Computation> {
        self.inner.current.borrow().clone()
    }

    /// Runs `f` now and again every time something it read changes.
    ///
    /// A computation started inside another one is stopped when the outer one
    /// is invalidated.
    pub fn autorun(&self, f: impl FnMut(&Computation) + 'static) -> Computation {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let computation = Computation::new(id, self, Box::new(f));
        if let Some(parent) = self.current() {
            let child = computation.clone();
            parent.on_invalidate(move |_| child.stop());
        }

        tracing::trace!(computation = id, "Starting computation");
        computation.compute();
        computation
    }

    /// Runs `f` with no current computation, so nothing it reads is tracked.
    pub fn nonreactive<R>(&self, f: impl FnOnce() -> R) -> R {
        self.with_computation(None, f)
    }

    pub(crate) fn with_computation<R>(
        &self,
        computation: Option<Computation>,
        f: impl FnOnce() -> R,
    ) -> R {
        let previous = self.inner.current.replace(computation);
        let _restore = RestoreCurrent {
            tracker: self,
            previous: Some(previous),
        };
        f()
    }

    /// Registers `f` on the current computation's invalidation.
    ///
    /// Returns false, without registering, when no computation is running.
    pub fn on_invalidate(&self, f: impl FnOnce(&Computation) + 'static) -> bool {
        match self.current() {
            Some(computation) => {
                computation.on_invalidate(f);
                true
            }
            None => false,
        }
    }

    /// Schedules `f` to run once the next flush has rerun every pending
    /// computation.
    pub fn after_flush(&self, f: impl FnOnce() + 'static) {
        self.inner.after_flush.borrow_mut().push_back(Box::new(f));
    }

    /// True when a flush would do anything.
    pub fn has_pending_work(&self) -> bool {
        !self.inner.pending.borrow().is_empty() || !self.inner.after_flush.borrow().is_empty()
    }

    pub(crate) fn schedule(&self, computation: Computation) {
        self.inner.pending.borrow_mut().push_back(computation);
    }

    /// Reruns invalidated computations, then drains after-flush callbacks.
    ///
    /// After-flush callbacks run one at a time; computations they invalidate
    /// rerun before the next callback. Calling `flush` from inside a flush is
    /// ignored. A flush stops after [`MAX_FLUSH_RERUNS`] reruns, leaving the
    /// remaining work queued for the next one.
    pub fn flush(&self) {
        if self.inner.flushing.replace(true) {
            tracing::warn!("Ignoring nested flush");
            return;
        }
        let _reset = ResetFlushing(&self.inner.flushing);

        let mut reruns = 0usize;
        let mut callbacks = 0usize;
        loop {
            loop {
                if reruns >= MAX_FLUSH_RERUNS && !self.inner.pending.borrow().is_empty() {
                    tracing::error!(
                        reruns,
                        pending = self.inner.pending.borrow().len(),
                        "Computations keep invalidating themselves, abandoning flush"
                    );
                    return;
                }

                let next = self.inner.pending.borrow_mut().pop_front();
                let Some(computation) = next else {
                    break;
                };
                computation.recompute();
                reruns += 1;
                if computation.needs_recompute() {
                    self.inner.pending.borrow_mut().push_front(computation);
                }
            }

            let next = self.inner.after_flush.borrow_mut().pop_front();
            match next {
                Some(callback) => {
                    callback();
                    callbacks += 1;
                }
                None => break,
            }
        }

        if reruns > 0 || callbacks > 0 {
            tracing::trace!(reruns, callbacks, "Flush settled");
        }
    }
}

struct RestoreCurrent<'a> {
    tracker: &'a Tracker,
    previous: Option<Option<Computation>>,
}

impl Drop for RestoreCurrent<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.tracker.inner.current.replace(previous);
        }
    }
}

struct ResetFlushing<'a>(&'a Cell<bool>);

impl Drop for ResetFlushing<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveVar;

    #[test]
    fn test_autorun_runs_immediately_and_tracks() {
        let tracker = Tracker::new();
        let var = ReactiveVar::new(&tracker, 1);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (v, s) = (var.clone(), seen.clone());
        tracker.autorun(move |_| s.borrow_mut().push(v.get()));
        assert_eq!(*seen.borrow(), vec![1]);

        var.set(2);
        assert_eq!(*seen.borrow(), vec![1], "reruns wait for a flush");

        tracker.flush();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_nonreactive_reads_are_not_tracked() {
        let tracker = Tracker::new();
        let var = ReactiveVar::new(&tracker, 1);
        let runs = Rc::new(Cell::new(0));

        let (t, v, r) = (tracker.clone(), var.clone(), runs.clone());
        tracker.autorun(move |_| {
            r.set(r.get() + 1);
            t.nonreactive(|| v.get());
        });

        var.set(2);
        tracker.flush();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_current_is_restored_after_run() {
        let tracker = Tracker::new();
        assert!(!tracker.active());

        let t = tracker.clone();
        let inside = Rc::new(Cell::new(false));
        let i = inside.clone();
        tracker.autorun(move |_| i.set(t.active()));

        assert!(inside.get());
        assert!(!tracker.active());
    }

    #[test]
    fn test_after_flush_runs_after_reruns() {
        let tracker = Tracker::new();
        let var = ReactiveVar::new(&tracker, 0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let (v, l) = (var.clone(), log.clone());
        tracker.autorun(move |_| l.borrow_mut().push(format!("run {}", v.get())));

        let l = log.clone();
        tracker.after_flush(move || l.borrow_mut().push("after".to_string()));
        var.set(1);
        tracker.flush();

        assert_eq!(*log.borrow(), vec!["run 0", "run 1", "after"]);
        assert!(!tracker.has_pending_work());
    }

    #[test]
    fn test_after_flush_invalidations_rerun_in_same_flush() {
        let tracker = Tracker::new();
        let var = ReactiveVar::new(&tracker, 0);
        let runs = Rc::new(Cell::new(0));

        let (v, r) = (var.clone(), runs.clone());
        tracker.autorun(move |_| {
            v.get();
            r.set(r.get() + 1);
        });

        let v = var.clone();
        tracker.after_flush(move || v.set(5));
        tracker.flush();

        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_on_invalidate_without_computation() {
        let tracker = Tracker::new();
        assert!(!tracker.on_invalidate(|_| {}));
    }

    #[test]
    fn test_nested_flush_is_ignored() {
        let tracker = Tracker::new();
        let t = tracker.clone();
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        tracker.after_flush(move || {
            t.flush();
            r.set(true);
        });

        tracker.flush();
        assert!(ran.get());
    }

    #[test]
    fn test_flush_gives_up_on_self_invalidating_computation() {
        let tracker = Tracker::new();
        let runs = Rc::new(Cell::new(0));

        let r = runs.clone();
        let computation = tracker.autorun(move |c| {
            r.set(r.get() + 1);
            c.invalidate();
        });

        tracker.flush();
        assert_eq!(runs.get(), 1 + MAX_FLUSH_RERUNS);
        assert!(tracker.has_pending_work());

        computation.stop();
        tracker.flush();
        assert_eq!(runs.get(), 1 + MAX_FLUSH_RERUNS);
        assert!(!tracker.has_pending_work());
    }
}
