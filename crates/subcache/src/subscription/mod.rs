//! The subscription a cache serves.
//!
//! A subscription supplies readiness and the destination parameters the cache
//! tags and scopes documents with. [`ReactiveSubscription`] is a settable
//! implementation backed by reactive variables.

use std::fmt;

use subcache_core::document::DestinationKey;

use crate::reactive::{ReactiveVar, Tracker};

/// Readiness and destination parameters of one subscription.
pub trait Subscription {
    /// Whether the initial data has arrived. Reactive.
    fn is_ready(&self) -> bool;

    /// The current parameter. Reactive.
    fn params(&self) -> Option<DestinationKey>;

    /// The destination the subscription is currently serving. Reactive.
    fn active_params(&self) -> Option<DestinationKey>;

    /// The destination being switched to, while a switch is in flight.
    /// Reactive.
    fn next_params(&self) -> Option<DestinationKey>;
}

/// A subscription whose state is set by hand.
#[derive(Clone)]
pub struct ReactiveSubscription {
    ready: ReactiveVar<bool>,
    params: ReactiveVar<Option<DestinationKey>>,
    active: ReactiveVar<Option<DestinationKey>>,
    next: ReactiveVar<Option<DestinationKey>>,
}

impl fmt::Debug for ReactiveSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveSubscription")
            .field("ready", &self.ready.get_untracked())
            .field("params", &self.params.get_untracked())
            .field("active", &self.active.get_untracked())
            .field("next", &self.next.get_untracked())
            .finish()
    }
}

impl ReactiveSubscription {
    /// A subscription that is not ready and has no parameters.
    pub fn new(tracker: &Tracker) -> Self {
        Self {
            ready: ReactiveVar::new(tracker, false),
            params: ReactiveVar::new(tracker, None),
            active: ReactiveVar::new(tracker, None),
            next: ReactiveVar::new(tracker, None),
        }
    }

    /// Sets both the current and the active parameter.
    pub fn with_params(self, key: impl Into<DestinationKey>) -> Self {
        let key = key.into();
        self.params.set(Some(key.clone()));
        self.active.set(Some(key));
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
    }

    pub fn set_params(&self, key: Option<DestinationKey>) {
        self.params.set(key);
    }

    pub fn set_active_params(&self, key: Option<DestinationKey>) {
        self.active.set(key);
    }

    pub fn set_next_params(&self, key: Option<DestinationKey>) {
        self.next.set(key);
    }

    /// Starts moving to `key`: documents observed from now on are tagged
    /// with it and the subscription is not ready until the switch completes.
    pub fn begin_switch(&self, key: impl Into<DestinationKey>) {
        let key = key.into();
        tracing::debug!(to = %key, "Switching subscription");
        self.set_next_params(Some(key.clone()));
        self.set_params(Some(key));
        self.set_ready(false);
    }

    /// Makes the pending destination the active one and marks the
    /// subscription ready.
    pub fn complete_switch(&self) {
        if let Some(key) = self.next.get_untracked() {
            self.set_next_params(None);
            self.set_active_params(Some(key));
        }
        self.set_ready(true);
    }
}

impl Subscription for ReactiveSubscription {
    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn params(&self) -> Option<DestinationKey> {
        self.params.get()
    }

    fn active_params(&self) -> Option<DestinationKey> {
        self.active.get()
    }

    fn next_params(&self) -> Option<DestinationKey> {
        self.next.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_new_subscription_is_empty() {
        let tracker = Tracker::new();
        let sub = ReactiveSubscription::new(&tracker);

        assert!(!sub.is_ready());
        assert_eq!(sub.params(), None);
        assert_eq!(sub.active_params(), None);
        assert_eq!(sub.next_params(), None);
    }

    #[test]
    fn test_switch_sets_next_then_promotes_it() {
        let tracker = Tracker::new();
        let sub = ReactiveSubscription::new(&tracker).with_params("s1");
        sub.set_ready(true);

        sub.begin_switch("s2");
        assert!(!sub.is_ready());
        assert_eq!(sub.params(), Some("s2".into()));
        assert_eq!(sub.active_params(), Some("s1".into()));
        assert_eq!(sub.next_params(), Some("s2".into()));

        sub.complete_switch();
        assert!(sub.is_ready());
        assert_eq!(sub.active_params(), Some("s2".into()));
        assert_eq!(sub.next_params(), None);
    }

    #[test]
    fn test_readiness_is_reactive() {
        let tracker = Tracker::new();
        let sub = ReactiveSubscription::new(&tracker);
        let runs = Rc::new(Cell::new(0));

        let (s, r) = (sub.clone(), runs.clone());
        tracker.autorun(move |_| {
            s.is_ready();
            r.set(r.get() + 1);
        });

        sub.set_ready(true);
        tracker.flush();
        sub.set_active_params(Some("s1".into()));
        tracker.flush();

        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_switch_reruns_readers_of_active_params() {
        let tracker = Tracker::new();
        let sub = ReactiveSubscription::new(&tracker).with_params("s1");
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));

        let (s, v) = (sub.clone(), seen.clone());
        tracker.autorun(move |_| v.borrow_mut().push((s.active_params(), s.next_params())));

        sub.set_next_params(Some("s2".into()));
        tracker.flush();
        sub.complete_switch();
        tracker.flush();

        assert_eq!(
            *seen.borrow(),
            vec![
                (Some("s1".into()), None),
                (Some("s1".into()), Some("s2".into())),
                (Some("s2".into()), None),
            ]
        );
    }
}
