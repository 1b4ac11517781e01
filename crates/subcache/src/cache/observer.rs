use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use chrono::Utc;
use subcache_core::document::{DestinationKey, Document, DocumentId};
use subcache_core::query::Selector;

use crate::feed::{ChangeObserver, ObserveHandle, ParentDataset};
use crate::reactive::{Computation, Tracker};
use crate::subscription::Subscription;

use super::store::CacheStore;

type HandleSlot = Rc<RefCell<Option<ObserveHandle>>>;

/// Feeds parent change events into the cache store.
struct CacheFeedObserver {
    tracker: Tracker,
    store: CacheStore,
    subscription: Rc<dyn Subscription>,
}

impl CacheFeedObserver {
    /// Destination a newly observed document is tagged with: the pending
    /// next parameter, else the current parameter, else the active one.
    fn tag_for_added(&self) -> Option<DestinationKey> {
        let sub = &self.subscription;
        self.tracker.nonreactive(|| {
            sub.next_params()
                .or_else(|| sub.params())
                .or_else(|| sub.active_params())
        })
    }
}

impl ChangeObserver for CacheFeedObserver {
    fn added(&self, id: &DocumentId, fields: &Document) {
        let to = self.tag_for_added();
        self.store.apply_added(id, fields, to, Utc::now());
    }

    fn changed(&self, id: &DocumentId, fields: &Document) {
        self.store.apply_changed(id, fields, Utc::now());
    }

    fn removed(&self, id: &DocumentId) {
        self.store.apply_removed(id);
    }
}

/// Keeps exactly one feed observer attached to the parent while the
/// subscription is ready.
///
/// The controller runs a single computation that reads readiness: ready with
/// nothing attached attaches an observer, not ready detaches it. Stopping the
/// computation detaches as well. Starting is idempotent.
pub struct ObserverLifecycleController {
    tracker: Tracker,
    subscription: Rc<dyn Subscription>,
    parent: Rc<dyn ParentDataset>,
    store: CacheStore,
    computation: RefCell<Option<Computation>>,
    handle: HandleSlot,
    attachments: Rc<Cell<usize>>,
}

impl fmt::Debug for ObserverLifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverLifecycleController")
            .field("running", &self.is_running())
            .field("attached", &self.is_attached())
            .field("attachments", &self.attachments.get())
            .finish()
    }
}

impl ObserverLifecycleController {
    pub fn new(
        tracker: &Tracker,
        subscription: Rc<dyn Subscription>,
        parent: Rc<dyn ParentDataset>,
        store: CacheStore,
    ) -> Self {
        Self {
            tracker: tracker.clone(),
            subscription,
            parent,
            store,
            computation: RefCell::new(None),
            handle: Rc::new(RefCell::new(None)),
            attachments: Rc::new(Cell::new(0)),
        }
    }

    /// Starts the controlling computation unless it is already running.
    ///
    /// The computation is created outside any current computation so that a
    /// consumer rerunning does not take it down.
    pub fn start(&self) {
        if self.is_running() {
            return;
        }

        let tracker = self.tracker.clone();
        let subscription = self.subscription.clone();
        let parent = self.parent.clone();
        let store = self.store.clone();
        let handle = self.handle.clone();
        let attachments = self.attachments.clone();

        let computation = self.tracker.nonreactive(|| {
            self.tracker.autorun(move |c| {
                if c.first_run() {
                    let handle = handle.clone();
                    c.on_stop(move |_| detach(&handle));
                }

                if !subscription.is_ready() {
                    detach(&handle);
                    return;
                }

                let attached = handle.borrow().is_some();
                if attached {
                    return;
                }

                let observer = Rc::new(CacheFeedObserver {
                    tracker: tracker.clone(),
                    store: store.clone(),
                    subscription: subscription.clone(),
                });
                let observe = tracker.nonreactive(|| parent.observe_changes(&Selector::all(), observer));
                *handle.borrow_mut() = Some(observe);
                attachments.set(attachments.get() + 1);
                tracing::debug!(entries = store.len(), "Attached feed observer");
            })
        });

        tracing::debug!(computation = computation.id(), "Started observer lifecycle");
        *self.computation.borrow_mut() = Some(computation);
    }

    /// Stops the controlling computation, detaching any observer. Does
    /// nothing when not running.
    pub fn stop(&self) {
        let computation = self.computation.borrow_mut().take();
        if let Some(computation) = computation {
            tracing::debug!(computation = computation.id(), "Stopping observer lifecycle");
            computation.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.computation
            .borrow()
            .as_ref()
            .is_some_and(|c| !c.is_stopped())
    }

    /// Whether a feed observer is currently registered with the parent.
    pub fn is_attached(&self) -> bool {
        self.handle.borrow().is_some()
    }

    /// How many times an observer has been attached since construction.
    pub fn attachments(&self) -> usize {
        self.attachments.get()
    }
}

fn detach(handle: &RefCell<Option<ObserveHandle>>) {
    let taken = handle.borrow_mut().take();
    if let Some(mut observe) = taken {
        observe.stop();
        tracing::debug!("Detached feed observer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::MemoryDataset;
    use crate::subscription::ReactiveSubscription;
    use serde_json::json;

    struct Fixture {
        tracker: Tracker,
        subscription: ReactiveSubscription,
        parent: MemoryDataset,
        store: CacheStore,
        controller: ObserverLifecycleController,
    }

    fn fixture() -> Fixture {
        let tracker = Tracker::new();
        let subscription = ReactiveSubscription::new(&tracker).with_params("s1");
        let parent = MemoryDataset::new();
        let store = CacheStore::new(&tracker);
        let controller = ObserverLifecycleController::new(
            &tracker,
            Rc::new(subscription.clone()),
            Rc::new(parent.clone()),
            store.clone(),
        );
        Fixture {
            tracker,
            subscription,
            parent,
            store,
            controller,
        }
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_attaches_only_when_ready() {
        let f = fixture();
        f.parent.insert(doc(json!({"_id": "a", "x": 1}))).unwrap();

        f.controller.start();
        assert!(f.controller.is_running());
        assert!(!f.controller.is_attached());
        assert!(f.store.is_empty());

        f.subscription.set_ready(true);
        f.tracker.flush();

        assert!(f.controller.is_attached());
        assert_eq!(f.parent.observer_count(), 1);
        let entry = f.store.get(&"a".into()).unwrap();
        assert!(entry.destinations.contains(&"s1".into()));
    }

    #[test]
    fn test_start_is_idempotent() {
        let f = fixture();
        f.subscription.set_ready(true);

        f.controller.start();
        f.controller.start();
        f.tracker.flush();

        assert_eq!(f.parent.observer_count(), 1);
        assert_eq!(f.controller.attachments(), 1);
    }

    #[test]
    fn test_readiness_flips_toggle_single_observer() {
        let f = fixture();
        f.subscription.set_ready(true);
        f.controller.start();

        for _ in 0..3 {
            f.subscription.set_ready(false);
            f.tracker.flush();
            assert!(!f.controller.is_attached());
            assert_eq!(f.parent.observer_count(), 0);

            f.subscription.set_ready(true);
            f.tracker.flush();
            assert_eq!(f.parent.observer_count(), 1);
        }
        assert_eq!(f.controller.attachments(), 4);
    }

    #[test]
    fn test_readiness_flips_within_one_flush_keep_single_observer() {
        let f = fixture();
        f.subscription.set_ready(true);
        f.controller.start();
        assert_eq!(f.controller.attachments(), 1);

        // Back to ready before the controller reruns: nothing to undo.
        f.subscription.set_ready(false);
        f.subscription.set_ready(true);
        f.subscription.set_ready(false);
        f.subscription.set_ready(true);
        f.tracker.flush();
        assert!(f.controller.is_attached());
        assert_eq!(f.parent.observer_count(), 1);
        assert_eq!(f.controller.attachments(), 1);

        f.subscription.set_ready(false);
        f.tracker.flush();
        assert_eq!(f.parent.observer_count(), 0);

        f.subscription.set_ready(true);
        f.subscription.set_ready(false);
        f.subscription.set_ready(true);
        f.tracker.flush();
        assert_eq!(f.parent.observer_count(), 1);
        assert_eq!(f.controller.attachments(), 2);

        // Ends not ready: the rerun only detaches.
        f.subscription.set_ready(false);
        f.subscription.set_ready(true);
        f.subscription.set_ready(false);
        f.tracker.flush();
        assert!(!f.controller.is_attached());
        assert_eq!(f.parent.observer_count(), 0);
        assert_eq!(f.controller.attachments(), 2);
    }

    #[test]
    fn test_stop_detaches() {
        let f = fixture();
        f.subscription.set_ready(true);
        f.controller.start();

        f.controller.stop();
        f.controller.stop();

        assert!(!f.controller.is_running());
        assert!(!f.controller.is_attached());
        assert_eq!(f.parent.observer_count(), 0);
    }

    #[test]
    fn test_added_prefers_next_params() {
        let f = fixture();
        f.subscription.set_ready(true);
        f.controller.start();

        f.subscription.set_next_params(Some("next".into()));
        f.parent.insert(doc(json!({"_id": "a"}))).unwrap();

        let entry = f.store.get(&"a".into()).unwrap();
        assert!(entry.destinations.contains(&"next".into()));
        assert!(!entry.destinations.contains(&"s1".into()));
    }

    #[test]
    fn test_added_falls_back_to_current_params() {
        let tracker = Tracker::new();
        let subscription = ReactiveSubscription::new(&tracker);
        subscription.set_params(Some("s1".into()));
        subscription.set_ready(true);
        let parent = MemoryDataset::new();
        let store = CacheStore::new(&tracker);
        let controller = ObserverLifecycleController::new(
            &tracker,
            Rc::new(subscription.clone()),
            Rc::new(parent.clone()),
            store.clone(),
        );
        controller.start();

        parent.insert(doc(json!({"_id": "a", "x": 1}))).unwrap();

        let entry = store.get(&"a".into()).unwrap();
        assert_eq!(entry.destinations.len(), 1);
        assert!(entry.destinations.contains(&"s1".into()));
    }

    #[test]
    fn test_added_prefers_current_over_active_params() {
        let f = fixture();
        f.subscription.set_params(Some("s2".into()));
        f.subscription.set_ready(true);
        f.controller.start();

        f.parent.insert(doc(json!({"_id": "a"}))).unwrap();

        let entry = f.store.get(&"a".into()).unwrap();
        assert!(entry.destinations.contains(&"s2".into()));
        assert!(!entry.destinations.contains(&"s1".into()));
    }

    #[test]
    fn test_feed_events_reach_store() {
        let f = fixture();
        f.subscription.set_ready(true);
        f.controller.start();

        let id = f.parent.insert(doc(json!({"_id": "a", "x": 1}))).unwrap();
        f.parent.update(&id, &doc(json!({"x": 2}))).unwrap();
        assert_eq!(f.store.get(&id).unwrap().payload["x"], json!(2));

        f.parent.remove(&id).unwrap();
        assert!(f.store.get(&id).is_none());
    }
}
