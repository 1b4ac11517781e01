//! subcache - destination-tagged local caches over a shared, changing dataset.
//!
//! A [`CollectionCache`] mirrors the documents of a parent dataset that a
//! subscription is interested in, tags each one with the destinations it was
//! observed under, and keeps the parent feed attached only while some
//! computation still reads from it.

pub mod cache;
pub mod cli;
pub mod config;
pub mod feed;
pub mod output;
pub mod reactive;
pub mod simulation;
pub mod subscription;

pub use cache::{CacheOptions, CollectionCache, Cursor};
pub use config::Config;
pub use reactive::Tracker;
