//! Randomised driver that exercises a cache end to end.
//!
//! Each step applies one random mutation to the parent dataset, or moves the
//! subscription to another destination, then flushes the tracker and
//! captures what two live consumers see: one scoped to the current
//! destination and one spanning all of them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use serde_json::json;
use subcache_core::document::{DestinationKey, Document, DocumentId};
use subcache_core::query::{FindOptions, Selector, SortSpec};

use crate::cache::CollectionCache;
use crate::config::Config;
use crate::feed::{MemoryDataset, Result};
use crate::reactive::{Computation, Tracker};
use crate::subscription::{ReactiveSubscription, Subscription};

/// Documents inserted before the first step.
const INITIAL_DOCUMENTS: usize = 3;

/// What a step did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Inserted { id: DocumentId },
    Updated { id: DocumentId, score: u32 },
    Removed { id: DocumentId },
    Switched { from: Option<DestinationKey>, to: DestinationKey },
}

/// What the consumers see after a step.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub action: Action,
    pub destination: Option<DestinationKey>,
    pub observing: bool,
    pub consumers: usize,
    pub cached: usize,
    pub scoped: Vec<Document>,
    pub in_all: Vec<Document>,
}

/// State after both consumers have stopped.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub ticks: u64,
    pub observing: bool,
    pub parent_observers: usize,
    pub cached: usize,
    pub consumer_runs: usize,
}

struct Consumer {
    computation: Computation,
    view: Rc<RefCell<Vec<Document>>>,
    runs: Rc<Cell<usize>>,
}

impl Consumer {
    fn start(tracker: &Tracker, cache: &CollectionCache, options: FindOptions) -> Self {
        let view = Rc::new(RefCell::new(Vec::new()));
        let runs = Rc::new(Cell::new(0));

        let (cache, v, r) = (cache.clone(), view.clone(), runs.clone());
        let computation = tracker.autorun(move |_| {
            r.set(r.get() + 1);
            *v.borrow_mut() = cache.find(Selector::all(), options.clone()).fetch();
        });

        Self {
            computation,
            view,
            runs,
        }
    }

    fn view(&self) -> Vec<Document> {
        self.view.borrow().clone()
    }
}

pub struct Simulation {
    tracker: Tracker,
    subscription: ReactiveSubscription,
    parent: MemoryDataset,
    cache: CollectionCache,
    destinations: Vec<DestinationKey>,
    max_documents: usize,
    rng: StdRng,
    scoped: Consumer,
    in_all: Consumer,
    tick: u64,
    inserted: usize,
}

impl Simulation {
    /// Builds the dataset, subscription, cache and both consumers.
    ///
    /// `seed` makes runs reproducible.
    pub fn new(config: &Config, seed: Option<u64>) -> Result<Self> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let tracker = Tracker::new();
        let parent = MemoryDataset::new();
        let mut subscription = ReactiveSubscription::new(&tracker);
        if let Some(first) = config.destinations.first() {
            subscription = subscription.with_params(first.clone());
        }

        let mut inserted = 0;
        for _ in 0..INITIAL_DOCUMENTS.min(config.max_documents) {
            parent.insert(new_document(inserted, &mut rng))?;
            inserted += 1;
        }

        let cache = CollectionCache::new(
            &tracker,
            Rc::new(subscription.clone()),
            Rc::new(parent.clone()),
            config.cache_options(),
        );

        let scoped = Consumer::start(
            &tracker,
            &cache,
            FindOptions::new().with_sort(SortSpec::new().desc("score")),
        );
        let in_all = Consumer::start(
            &tracker,
            &cache,
            FindOptions::new()
                .with_in_all(true)
                .with_sort(SortSpec::new().asc("title")),
        );

        subscription.set_ready(true);
        tracker.flush();

        tracing::info!(
            destinations = config.destinations.len(),
            documents = parent.len(),
            search_in_all = config.search_in_all,
            "Simulation ready"
        );

        Ok(Self {
            tracker,
            subscription,
            parent,
            cache,
            destinations: config.destinations.clone(),
            max_documents: config.max_documents,
            rng,
            scoped,
            in_all,
            tick: 0,
            inserted,
        })
    }

    /// Applies one random action and returns what the consumers now see.
    pub fn step(&mut self) -> Result<Snapshot> {
        self.tick += 1;
        let action = self.random_action()?;
        self.tracker.flush();

        tracing::debug!(tick = self.tick, action = ?action, "Applied step");
        Ok(self.snapshot(action))
    }

    fn random_action(&mut self) -> Result<Action> {
        let ids = self.parent.ids();
        let roll: u8 = self.rng.random_range(0..10);

        let can_insert = ids.len() < self.max_documents;
        let can_switch = self.destinations.len() > 1;

        if can_insert && (ids.is_empty() || roll < 4) {
            let id = self
                .parent
                .insert(new_document(self.inserted, &mut self.rng))?;
            self.inserted += 1;
            return Ok(Action::Inserted { id });
        }

        if roll >= 8 && can_switch {
            return Ok(self.switch_destination());
        }

        let Some(id) = ids.choose(&mut self.rng).cloned() else {
            return Ok(self.switch_destination());
        };

        if roll == 7 {
            self.parent.remove(&id)?;
            return Ok(Action::Removed { id });
        }

        let score = self.rng.random_range(0..100u32);
        let mut fields = Document::new();
        fields.insert("score".to_string(), json!(score));
        self.parent.update(&id, &fields)?;
        Ok(Action::Updated { id, score })
    }

    fn switch_destination(&mut self) -> Action {
        let from = self.subscription.active_params();
        let choices: Vec<&DestinationKey> = self
            .destinations
            .iter()
            .filter(|key| Some(*key) != from.as_ref())
            .collect();
        let to = choices
            .choose(&mut self.rng)
            .map(|key| (*key).clone())
            .or_else(|| from.clone())
            .unwrap_or_else(|| DestinationKey::from("default"));

        self.subscription.begin_switch(to.clone());
        self.tracker.flush();
        self.subscription.complete_switch();

        Action::Switched { from, to }
    }

    fn snapshot(&self, action: Action) -> Snapshot {
        Snapshot {
            tick: self.tick,
            action,
            destination: self.subscription.active_params(),
            observing: self.cache.is_observing(),
            consumers: self.cache.observe_count(),
            cached: self.cache.store().len(),
            scoped: self.scoped.view(),
            in_all: self.in_all.view(),
        }
    }

    /// Stops both consumers and flushes so the cache can release its
    /// observer.
    pub fn finish(self) -> Summary {
        self.scoped.computation.stop();
        self.in_all.computation.stop();
        self.tracker.flush();

        let summary = Summary {
            ticks: self.tick,
            observing: self.cache.is_observing(),
            parent_observers: self.parent.observer_count(),
            cached: self.cache.store().len(),
            consumer_runs: self.scoped.runs.get() + self.in_all.runs.get(),
        };

        if summary.observing {
            tracing::warn!("Feed observer still attached after consumers stopped");
        } else {
            tracing::info!(ticks = summary.ticks, "Consumers stopped, feed observer detached");
        }
        summary
    }
}

fn new_document(n: usize, rng: &mut StdRng) -> Document {
    let mut doc = Document::new();
    doc.insert("title".to_string(), json!(format!("doc-{n:03}")));
    doc.insert("score".to_string(), json!(rng.random_range(0..100u32)));
    doc
}
