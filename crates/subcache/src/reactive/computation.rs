use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::tracker::{Tracker, TrackerInner};

type Func = Box<dyn FnMut(&Computation)>;
type Callback = Box<dyn FnOnce(&Computation)>;

struct ComputationInner {
    id: u64,
    tracker: Weak<TrackerInner>,
    func: RefCell<Option<Func>>,
    invalidated: Cell<bool>,
    stopped: Cell<bool>,
    first_run: Cell<bool>,
    recomputing: Cell<bool>,
    on_invalidate: RefCell<Vec<Callback>>,
    on_stop: RefCell<Vec<Callback>>,
}

/// A function that reruns when its reactive inputs change.
///
/// Cloning yields another handle to the same computation.
#[derive(Clone)]
pub struct Computation {
    inner: Rc<ComputationInner>,
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("invalidated", &self.inner.invalidated.get())
            .field("stopped", &self.inner.stopped.get())
            .finish()
    }
}

impl PartialEq for Computation {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Computation {}

impl Computation {
    pub(crate) fn new(id: u64, tracker: &Tracker, func: Func) -> Self {
        Self {
            inner: Rc::new(ComputationInner {
                id,
                tracker: Rc::downgrade(&tracker.inner),
                func: RefCell::new(Some(func)),
                invalidated: Cell::new(false),
                stopped: Cell::new(false),
                first_run: Cell::new(true),
                recomputing: Cell::new(false),
                on_invalidate: RefCell::new(Vec::new()),
                on_stop: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// True during the first run only.
    pub fn first_run(&self) -> bool {
        self.inner.first_run.get()
    }

    pub fn is_invalidated(&self) -> bool {
        self.inner.invalidated.get()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.get()
    }

    fn tracker(&self) -> Option<Tracker> {
        self.inner.tracker.upgrade().map(Tracker::from_inner)
    }

    fn run_untracked(&self, callback: Callback) {
        match self.tracker() {
            Some(tracker) => tracker.nonreactive(|| callback(self)),
            None => callback(self),
        }
    }

    /// Marks the computation for rerun on the next flush and fires the
    /// invalidation callbacks. Idempotent until the next run.
    pub fn invalidate(&self) {
        if self.inner.invalidated.replace(true) {
            return;
        }

        if !self.inner.recomputing.get() && !self.inner.stopped.get() {
            if let Some(tracker) = self.tracker() {
                tracker.schedule(self.clone());
            }
        }

        let callbacks = std::mem::take(&mut *self.inner.on_invalidate.borrow_mut());
        for callback in callbacks {
            self.run_untracked(callback);
        }
    }

    /// Stops the computation for good: invalidates it, fires the stop
    /// callbacks and drops its function.
    pub fn stop(&self) {
        if self.inner.stopped.replace(true) {
            return;
        }
        tracing::trace!(computation = self.inner.id, "Stopping computation");

        self.invalidate();

        let callbacks = std::mem::take(&mut *self.inner.on_stop.borrow_mut());
        for callback in callbacks {
            self.run_untracked(callback);
        }

        // Releases whatever the function captured.
        let func = self.inner.func.borrow_mut().take();
        drop(func);
    }

    /// Runs `f` on the next invalidation, or right away if already invalidated.
    pub fn on_invalidate(&self, f: impl FnOnce(&Computation) + 'static) {
        if self.inner.invalidated.get() {
            self.run_untracked(Box::new(f));
        } else {
            self.inner.on_invalidate.borrow_mut().push(Box::new(f));
        }
    }

    /// Runs `f` when the computation stops, or right away if already stopped.
    pub fn on_stop(&self, f: impl FnOnce(&Computation) + 'static) {
        if self.inner.stopped.get() {
            self.run_untracked(Box::new(f));
        } else {
            self.inner.on_stop.borrow_mut().push(Box::new(f));
        }
    }

    pub(crate) fn needs_recompute(&self) -> bool {
        self.inner.invalidated.get() && !self.inner.stopped.get()
    }

    pub(crate) fn recompute(&self) {
        self.inner.recomputing.set(true);
        if self.needs_recompute() {
            self.compute();
        }
        self.inner.recomputing.set(false);
    }

    pub(crate) fn compute(&self) {
        self.inner.invalidated.set(false);

        let taken = self.inner.func.borrow_mut().take();
        let Some(mut func) = taken else {
            return;
        };

        match self.tracker() {
            Some(tracker) => tracker.with_computation(Some(self.clone()), || func(self)),
            None => func(self),
        }

        if !self.inner.stopped.get() {
            *self.inner.func.borrow_mut() = Some(func);
        }
        self.inner.first_run.set(false);
    }
}
