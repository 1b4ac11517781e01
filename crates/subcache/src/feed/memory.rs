//! In-memory parent dataset.
//!
//! Holds documents keyed by id and pushes change events to registered
//! observers whose selector matches. A document moving into or out of an
//! observer's selector is reported as `added` or `removed`.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use subcache_core::document::{values_equal, Document, DocumentId, ID_FIELD};
use subcache_core::query::Selector;
use uuid::Uuid;

use super::{ChangeObserver, DatasetError, ObserveHandle, ParentDataset, Result};

struct ObserverSlot {
    selector: Selector,
    observer: Rc<dyn ChangeObserver>,
}

#[derive(Default)]
struct Inner {
    documents: RefCell<BTreeMap<DocumentId, Document>>,
    observers: RefCell<BTreeMap<u64, ObserverSlot>>,
    next_observer: Cell<u64>,
}

/// Event to deliver to one observer.
enum Delivery {
    Added(Document),
    Changed(Document),
    Removed,
}

/// Shared in-memory dataset. Cloning shares the documents and observers.
#[derive(Clone, Default)]
pub struct MemoryDataset {
    inner: Rc<Inner>,
}

impl fmt::Debug for MemoryDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDataset")
            .field("documents", &self.len())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.documents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    pub fn ids(&self) -> Vec<DocumentId> {
        self.inner.documents.borrow().keys().cloned().collect()
    }

    /// The stored document, including `_id`.
    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.inner.documents.borrow().get(id).cloned()
    }

    /// Inserts a new document. A missing `_id` gets a fresh UUID.
    pub fn insert(&self, mut doc: Document) -> Result<DocumentId> {
        let id = match doc.get(ID_FIELD) {
            None => DocumentId::new(Uuid::new_v4().to_string()),
            Some(Value::String(id)) => DocumentId::new(id.clone()),
            Some(other) => return Err(DatasetError::InvalidId(other.to_string())),
        };
        if self.inner.documents.borrow().contains_key(&id) {
            return Err(DatasetError::AlreadyExists(id));
        }

        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        self.inner
            .documents
            .borrow_mut()
            .insert(id.clone(), doc.clone());
        tracing::trace!(id = %id, "Inserted document");

        self.notify(&id, None, Some(&doc), &Document::new());
        Ok(id)
    }

    /// Sets the given fields on an existing document. A `null` value removes
    /// the field. Observers receive only the fields that actually changed.
    pub fn update(&self, id: &DocumentId, fields: &Document) -> Result<()> {
        let old = self
            .get(id)
            .ok_or_else(|| DatasetError::NotFound(id.clone()))?;

        let mut new = old.clone();
        let mut diff = Document::new();
        for (key, value) in fields {
            if key == ID_FIELD {
                continue;
            }
            match (old.get(key), value) {
                (None, Value::Null) => {}
                (Some(_), Value::Null) => {
                    new.remove(key);
                    diff.insert(key.clone(), Value::Null);
                }
                (Some(current), value) if values_equal(current, value) => {}
                (_, value) => {
                    new.insert(key.clone(), value.clone());
                    diff.insert(key.clone(), value.clone());
                }
            }
        }

        if diff.is_empty() {
            return Ok(());
        }

        self.inner
            .documents
            .borrow_mut()
            .insert(id.clone(), new.clone());
        tracing::trace!(id = %id, fields = diff.len(), "Updated document");

        self.notify(id, Some(&old), Some(&new), &diff);
        Ok(())
    }

    /// Updates the document if its id exists, inserts it otherwise.
    pub fn upsert(&self, doc: Document) -> Result<DocumentId> {
        let existing = match doc.get(ID_FIELD) {
            Some(Value::String(id)) => Some(DocumentId::new(id.clone())),
            _ => None,
        };

        match existing {
            Some(id) if self.inner.documents.borrow().contains_key(&id) => {
                self.update(&id, &doc)?;
                Ok(id)
            }
            _ => self.insert(doc),
        }
    }

    /// Deletes a document and returns it.
    pub fn remove(&self, id: &DocumentId) -> Result<Document> {
        let old = self
            .inner
            .documents
            .borrow_mut()
            .remove(id)
            .ok_or_else(|| DatasetError::NotFound(id.clone()))?;
        tracing::trace!(id = %id, "Removed document");

        self.notify(id, Some(&old), None, &Document::new());
        Ok(old)
    }

    fn register(&self, selector: Selector, observer: Rc<dyn ChangeObserver>) -> u64 {
        let key = self.inner.next_observer.get();
        self.inner.next_observer.set(key + 1);
        self.inner
            .observers
            .borrow_mut()
            .insert(key, ObserverSlot { selector, observer });
        key
    }

    /// Delivers one document transition to every interested observer.
    ///
    /// Deliveries are computed before any observer runs, so observers may
    /// register or stop others without disturbing this round.
    fn notify(&self, id: &DocumentId, old: Option<&Document>, new: Option<&Document>, diff: &Document) {
        let deliveries: Vec<(u64, Rc<dyn ChangeObserver>, Delivery)> = self
            .inner
            .observers
            .borrow()
            .iter()
            .filter_map(|(key, slot)| {
                let was = old.is_some_and(|doc| slot.selector.matches(doc));
                let is = new.is_some_and(|doc| slot.selector.matches(doc));
                let delivery = match (was, is, new) {
                    (false, true, Some(doc)) => Delivery::Added(without_id(doc)),
                    (true, true, _) => Delivery::Changed(diff.clone()),
                    (true, false, _) => Delivery::Removed,
                    _ => return None,
                };
                Some((*key, slot.observer.clone(), delivery))
            })
            .collect();

        for (key, observer, delivery) in deliveries {
            if !self.inner.observers.borrow().contains_key(&key) {
                continue;
            }
            match delivery {
                Delivery::Added(fields) => observer.added(id, &fields),
                Delivery::Changed(fields) => observer.changed(id, &fields),
                Delivery::Removed => observer.removed(id),
            }
        }
    }
}

impl ParentDataset for MemoryDataset {
    fn observe_changes(
        &self,
        selector: &Selector,
        observer: Rc<dyn ChangeObserver>,
    ) -> ObserveHandle {
        let initial = self.find(selector);
        let key = self.register(selector.clone(), observer.clone());
        tracing::debug!(observer = key, initial = initial.len(), "Observer registered");

        for doc in &initial {
            if let Some(Value::String(id)) = doc.get(ID_FIELD) {
                observer.added(&DocumentId::new(id.clone()), &without_id(doc));
            }
        }

        let inner: Weak<Inner> = Rc::downgrade(&self.inner);
        ObserveHandle::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.observers.borrow_mut().remove(&key);
                tracing::debug!(observer = key, "Observer unregistered");
            }
        })
    }

    fn find(&self, selector: &Selector) -> Vec<Document> {
        self.inner
            .documents
            .borrow()
            .values()
            .filter(|doc| selector.matches(doc))
            .cloned()
            .collect()
    }
}

fn without_id(doc: &Document) -> Document {
    let mut fields = doc.clone();
    fields.remove(ID_FIELD);
    fields
}
