use std::cell::RefCell;
use std::rc::Rc;

use super::dependency::Dependency;
use super::tracker::Tracker;

/// A value whose reads are tracked and whose writes invalidate readers.
#[derive(Debug, Clone)]
pub struct ReactiveVar<T> {
    value: Rc<RefCell<T>>,
    dep: Dependency,
}

impl<T: Clone + PartialEq> ReactiveVar<T> {
    pub fn new(tracker: &Tracker, value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
            dep: Dependency::new(tracker),
        }
    }

    pub fn get(&self) -> T {
        self.dep.depend();
        self.value.borrow().clone()
    }

    pub fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }

    /// Stores `value`; readers are invalidated only if it differs.
    pub fn set(&self, value: T) {
        if *self.value.borrow() == value {
            return;
        }
        *self.value.borrow_mut() = value;
        self.dep.changed();
    }
}
