//! Functional core for subcache.
//!
//! Everything in this crate is pure: documents, destination tagging, selector
//! matching, projection and ordering. The stateful pieces (reactive
//! scheduler, cache store, observer lifecycle) live in the `subcache` crate.

pub mod document;
pub mod query;
