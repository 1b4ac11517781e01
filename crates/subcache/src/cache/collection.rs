use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use subcache_core::document::Document;
use subcache_core::query::{
    resolve_destination, resolve_in_all, shape_query, DestinationScope, FindOptions, QueryKind,
    Selector, ShapedQuery,
};

use crate::feed::ParentDataset;
use crate::reactive::Tracker;
use crate::subscription::Subscription;

use super::observer::ObserverLifecycleController;
use super::refcount::ReferenceCounter;
use super::store::CacheStore;

/// Construction-time options of a [`CollectionCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Queries span every destination unless they set `in_all` themselves.
    pub search_in_all: bool,
}

impl CacheOptions {
    pub fn with_search_in_all(mut self, search_in_all: bool) -> Self {
        self.search_in_all = search_in_all;
        self
    }
}

struct CacheInner {
    tracker: Tracker,
    subscription: Rc<dyn Subscription>,
    store: CacheStore,
    controller: ObserverLifecycleController,
    refs: ReferenceCounter,
    options: CacheOptions,
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        self.controller.stop();
    }
}

/// Destination-aware local cache of one parent dataset for one subscription.
///
/// `find` and `find_one` return live results: read inside a computation,
/// they rerun it whenever cached entries change. The feed observer is
/// attached on first use and released once every consuming computation has
/// stopped. Clones share the same cache.
#[derive(Clone)]
pub struct CollectionCache {
    inner: Rc<CacheInner>,
}

impl fmt::Debug for CollectionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionCache")
            .field("options", &self.inner.options)
            .field("store", &self.inner.store)
            .field("controller", &self.inner.controller)
            .field("consumers", &self.inner.refs.count())
            .finish()
    }
}

impl CollectionCache {
    pub fn new(
        tracker: &Tracker,
        subscription: Rc<dyn Subscription>,
        parent: Rc<dyn ParentDataset>,
        options: CacheOptions,
    ) -> Self {
        let store = CacheStore::new(tracker);
        let controller =
            ObserverLifecycleController::new(tracker, subscription.clone(), parent, store.clone());

        Self {
            inner: Rc::new(CacheInner {
                tracker: tracker.clone(),
                subscription,
                store,
                controller,
                refs: ReferenceCounter::new(),
                options,
            }),
        }
    }

    /// Live cursor over cached documents matching `selector` and `options`.
    ///
    /// Unless `in_all` resolves to true, results are limited to documents
    /// tagged with the current destination.
    pub fn find(&self, selector: Selector, options: FindOptions) -> Cursor {
        self.run(selector, options, QueryKind::Many)
    }

    /// `find` over everything with default options.
    pub fn find_all(&self) -> Cursor {
        self.find(Selector::all(), FindOptions::default())
    }

    /// First matching document from any destination, unless the caller sets
    /// `in_all` to false.
    pub fn find_one(&self, selector: Selector, options: FindOptions) -> Option<Document> {
        self.run(selector, options, QueryKind::One).first()
    }

    /// `find` with a JSON selector and options.
    pub fn find_value(
        &self,
        selector: &Value,
        options: &Value,
    ) -> subcache_core::query::Result<Cursor> {
        let selector = Selector::from_value(selector)?;
        let options = FindOptions::from_value(options)?;
        Ok(self.find(selector, options))
    }

    /// `find_one` with a JSON selector and options.
    pub fn find_one_value(
        &self,
        selector: &Value,
        options: &Value,
    ) -> subcache_core::query::Result<Option<Document>> {
        let selector = Selector::from_value(selector)?;
        let options = FindOptions::from_value(options)?;
        Ok(self.find_one(selector, options))
    }

    fn run(&self, selector: Selector, options: FindOptions, kind: QueryKind) -> Cursor {
        let inner = &self.inner;

        let weak: Weak<CacheInner> = Rc::downgrade(inner);
        inner.refs.track(&inner.tracker, move || {
            if let Some(inner) = weak.upgrade() {
                tracing::debug!("Last cache consumer stopped");
                inner.controller.stop();
            }
        });
        inner.controller.start();

        let search_in_all = inner.options.search_in_all;
        let destination = if resolve_in_all(options.in_all, kind, search_in_all) {
            None
        } else {
            let sub = &inner.subscription;
            resolve_destination(sub.params(), sub.active_params(), sub.next_params())
        };
        let scope = DestinationScope {
            search_in_all,
            destination,
        };

        let query = shape_query(selector, options, kind, &scope);
        tracing::trace!(kind = ?kind, in_all = query.in_all, scope = ?scope.destination, "Shaped cache query");

        Cursor {
            store: inner.store.clone(),
            query,
        }
    }

    /// Number of computations currently reading from this cache.
    pub fn observe_count(&self) -> usize {
        self.inner.refs.count()
    }

    /// Whether a feed observer is registered with the parent dataset.
    pub fn is_observing(&self) -> bool {
        self.inner.controller.is_attached()
    }

    /// Whether the observer lifecycle computation is running.
    pub fn is_running(&self) -> bool {
        self.inner.controller.is_running()
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    pub fn options(&self) -> CacheOptions {
        self.inner.options
    }
}

/// A query against a cache, evaluated on each read.
#[derive(Debug, Clone)]
pub struct Cursor {
    store: CacheStore,
    query: ShapedQuery,
}

impl Cursor {
    pub fn fetch(&self) -> Vec<Document> {
        self.store.query(&self.query)
    }

    pub fn first(&self) -> Option<Document> {
        self.fetch().into_iter().next()
    }

    /// Number of matching documents, capped by the limit.
    pub fn count(&self) -> usize {
        let count = self.store.count(&self.query.selector);
        self.query.limit.map_or(count, |limit| count.min(limit))
    }

    pub fn query(&self) -> &ShapedQuery {
        &self.query
    }
}
