//! Destination-tagged subscription cache.
//!
//! - [`CacheStore`]: the tagged mirror itself.
//! - [`ObserverLifecycleController`]: attaches the parent feed while the
//!   subscription is ready.
//! - [`ReferenceCounter`]: releases the controller when the last consumer
//!   stops.
//! - [`CollectionCache`]: `find`/`find_one` on top of the three.

mod collection;
mod observer;
mod refcount;
mod store;

pub use collection::{CacheOptions, CollectionCache, Cursor};
pub use observer::ObserverLifecycleController;
pub use refcount::ReferenceCounter;
pub use store::CacheStore;
