//! Explicit reactive scheduler.
//!
//! A [`Tracker`] owns the current-computation slot and two queues: invalidated
//! computations waiting to rerun, and after-flush callbacks. Nothing runs on
//! its own; [`Tracker::flush`] reruns pending computations and then drains the
//! after-flush queue, looping until both are empty.
//!
//! Reading a [`ReactiveVar`] (or calling [`Dependency::depend`]) inside a
//! computation records an edge; changing the value invalidates every
//! dependent. A computation that is invalidated but not stopped reruns on the
//! next flush; a stopped one never does. Callbacks registered with
//! [`Computation::on_invalidate`] see both cases and can tell them apart with
//! [`Computation::is_stopped`] once the flush has settled.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`).

mod computation;
mod dependency;
mod tracker;
mod var;

pub use computation::Computation;
pub use dependency::Dependency;
pub use tracker::Tracker;
pub use var::ReactiveVar;
