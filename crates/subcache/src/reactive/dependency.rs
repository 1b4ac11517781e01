use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use super::computation::Computation;
use super::tracker::Tracker;

type Dependents = RefCell<BTreeMap<u64, Computation>>;

/// A source of change notifications that computations can depend on.
#[derive(Clone)]
pub struct Dependency {
    tracker: Tracker,
    dependents: Rc<Dependents>,
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("dependents", &self.dependents.borrow().len())
            .finish()
    }
}

impl Dependency {
    pub fn new(tracker: &Tracker) -> Self {
        Self {
            tracker: tracker.clone(),
            dependents: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }

    /// Records the current computation as a dependent.
    ///
    /// Returns true when a new edge was added.
    pub fn depend(&self) -> bool {
        let Some(computation) = self.tracker.current() else {
            return false;
        };

        let id = computation.id();
        if self.dependents.borrow().contains_key(&id) {
            return false;
        }
        self.dependents.borrow_mut().insert(id, computation.clone());

        let dependents: Weak<Dependents> = Rc::downgrade(&self.dependents);
        computation.on_invalidate(move |_| {
            if let Some(dependents) = dependents.upgrade() {
                dependents.borrow_mut().remove(&id);
            }
        });
        true
    }

    /// Invalidates every dependent.
    pub fn changed(&self) {
        let dependents: Vec<Computation> = self.dependents.borrow().values().cloned().collect();
        for computation in dependents {
            computation.invalidate();
        }
    }

    pub fn has_dependents(&self) -> bool {
        !self.dependents.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_depend_outside_computation() {
        let tracker = Tracker::new();
        let dep = Dependency::new(&tracker);

        assert!(!dep.depend());
        assert!(!dep.has_dependents());
    }

    #[test]
    fn test_depend_registers_once() {
        let tracker = Tracker::new();
        let dep = Dependency::new(&tracker);
        let added = Rc::new(RefCell::new(Vec::new()));

        let (d, a) = (dep.clone(), added.clone());
        tracker.autorun(move |_| {
            a.borrow_mut().push(d.depend());
            a.borrow_mut().push(d.depend());
        });

        assert_eq!(*added.borrow(), vec![true, false]);
        assert!(dep.has_dependents());
    }

    #[test]
    fn test_changed_invalidates_and_clears_edge() {
        let tracker = Tracker::new();
        let dep = Dependency::new(&tracker);
        let runs = Rc::new(Cell::new(0));

        let (d, r) = (dep.clone(), runs.clone());
        let computation = tracker.autorun(move |c| {
            r.set(r.get() + 1);
            if c.first_run() {
                d.depend();
            }
        });

        dep.changed();
        assert!(computation.is_invalidated());
        assert!(!dep.has_dependents());

        tracker.flush();
        dep.changed();
        tracker.flush();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_stopped_dependent_is_dropped() {
        let tracker = Tracker::new();
        let dep = Dependency::new(&tracker);

        let d = dep.clone();
        let computation = tracker.autorun(move |_| {
            d.depend();
        });
        computation.stop();

        assert!(!dep.has_dependents());
    }
}
