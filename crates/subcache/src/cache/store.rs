use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use subcache_core::document::{
    shadowed_fields, CacheEntry, DestinationKey, Document, DocumentId,
};
use subcache_core::query::{Selector, ShapedQuery};

use crate::reactive::{Dependency, Tracker};

/// Destination-tagged mirror of the parent documents a cache has observed.
///
/// Reads register a dependency on the whole store when run inside a
/// computation; every mutation invalidates those readers. Only the observer
/// lifecycle controller writes to it.
#[derive(Clone)]
pub struct CacheStore {
    entries: Rc<RefCell<BTreeMap<DocumentId, CacheEntry>>>,
    dep: Dependency,
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.entries.borrow().len())
            .finish()
    }
}

impl CacheStore {
    pub fn new(tracker: &Tracker) -> Self {
        Self {
            entries: Rc::new(RefCell::new(BTreeMap::new())),
            dep: Dependency::new(tracker),
        }
    }

    /// Runs a shaped query: filter, sort, limit, then project.
    pub fn query(&self, query: &ShapedQuery) -> Vec<Document> {
        self.dep.depend();

        let mut docs = self.matching(&query.selector);
        if let Some(sort) = &query.sort {
            sort.sort(&mut docs);
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }

        tracing::trace!(
            in_all = query.in_all,
            results = docs.len(),
            "Evaluated cache query"
        );
        docs.iter().map(|doc| query.projection.apply(doc)).collect()
    }

    /// Number of entries matching `selector`.
    pub fn count(&self, selector: &Selector) -> usize {
        self.dep.depend();
        self.entries
            .borrow()
            .values()
            .filter(|entry| selector.matches(&entry.to_document()))
            .count()
    }

    /// The raw entry for `id`. Not reactive.
    pub fn get(&self, id: &DocumentId) -> Option<CacheEntry> {
        self.entries.borrow().get(id).cloned()
    }

    /// Every entry in id order. Not reactive.
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.entries.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matching(&self, selector: &Selector) -> Vec<Document> {
        self.entries
            .borrow()
            .values()
            .map(CacheEntry::to_document)
            .filter(|doc| selector.matches(doc))
            .collect()
    }

    /// Records a document observed under `to`.
    ///
    /// A known id has its fields merged and gains `to` if it is missing;
    /// an unknown id becomes a new entry tagged with `to` alone.
    pub(crate) fn apply_added(
        &self,
        id: &DocumentId,
        fields: &Document,
        to: Option<DestinationKey>,
        at: DateTime<Utc>,
    ) {
        trace_shadowed(id, fields);
        {
            let mut entries = self.entries.borrow_mut();
            match entries.get_mut(id) {
                Some(entry) => {
                    entry.merge_fields(fields);
                    if let Some(to) = to {
                        let key = to.to_string();
                        if entry.tag(to) {
                            tracing::debug!(id = %id, destination = %key, "Tagged cached entry");
                        }
                    }
                    entry.touch(at);
                }
                None => {
                    tracing::debug!(id = %id, destination = ?to, "Caching new entry");
                    entries.insert(id.clone(), CacheEntry::new(id.clone(), fields, to, at));
                }
            }
        }
        self.dep.changed();
    }

    /// Applies a change set to a known entry. Unknown ids are ignored.
    pub(crate) fn apply_changed(&self, id: &DocumentId, fields: &Document, at: DateTime<Utc>) {
        trace_shadowed(id, fields);
        let updated = match self.entries.borrow_mut().get_mut(id) {
            Some(entry) => {
                entry.apply_changes(fields);
                entry.touch(at);
                true
            }
            None => false,
        };

        if updated {
            tracing::trace!(id = %id, fields = fields.len(), "Changed cached entry");
            self.dep.changed();
        } else {
            tracing::trace!(id = %id, "Ignoring change for unknown entry");
        }
    }

    /// Drops the entry for `id` whatever destinations it carries.
    pub(crate) fn apply_removed(&self, id: &DocumentId) {
        let removed = self.entries.borrow_mut().remove(id);
        if let Some(entry) = removed {
            tracing::debug!(
                id = %id,
                destinations = entry.destinations.len(),
                "Removed cached entry"
            );
            self.dep.changed();
        }
    }
}

fn trace_shadowed(id: &DocumentId, fields: &Document) {
    let shadowed = shadowed_fields(fields);
    if !shadowed.is_empty() {
        tracing::trace!(id = %id, fields = ?shadowed, "Dropping fields named like bookkeeping fields");
    }
}
