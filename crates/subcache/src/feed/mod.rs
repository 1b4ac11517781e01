//! The change feed between a parent dataset and its caches.
//!
//! A [`ParentDataset`] hands out `added`/`changed`/`removed` events for the
//! documents matching a selector. Registering an observer replays every
//! current match as `added` before returning, so a new observer starts with a
//! complete picture.

mod error;
mod memory;

use std::fmt;
use std::rc::Rc;

use subcache_core::document::{Document, DocumentId};
use subcache_core::query::Selector;

pub use error::{DatasetError, Result};
pub use memory::MemoryDataset;

/// Receives change events from a parent dataset.
///
/// `fields` never contains `_id`. In `changed`, a `null` value means the field
/// was removed.
pub trait ChangeObserver {
    fn added(&self, id: &DocumentId, fields: &Document);

    fn changed(&self, id: &DocumentId, fields: &Document);

    fn removed(&self, id: &DocumentId);
}

/// A shared dataset that caches mirror.
pub trait ParentDataset {
    /// Registers `observer` for documents matching `selector`.
    ///
    /// Existing matches are delivered as `added` events before this returns.
    fn observe_changes(&self, selector: &Selector, observer: Rc<dyn ChangeObserver>)
        -> ObserveHandle;

    /// Every document matching `selector`, including `_id`.
    fn find(&self, selector: &Selector) -> Vec<Document>;
}

/// Keeps an observer registered. Stopping (or dropping) the handle
/// unregisters it.
pub struct ObserveHandle {
    stop: Option<Box<dyn FnOnce()>>,
}

impl ObserveHandle {
    pub fn new(stop: impl FnOnce() + 'static) -> Self {
        Self {
            stop: Some(Box::new(stop)),
        }
    }

    /// Unregisters the observer. Later calls do nothing.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_none()
    }
}

impl fmt::Debug for ObserveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserveHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Drop for ObserveHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_handle_stop_is_idempotent() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let mut handle = ObserveHandle::new(move || c.set(c.get() + 1));

        handle.stop();
        handle.stop();
        drop(handle);

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_handle_stops_on_drop() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let handle = ObserveHandle::new(move || c.set(c.get() + 1));
        assert!(!handle.is_stopped());

        drop(handle);
        assert_eq!(calls.get(), 1);
    }
}
