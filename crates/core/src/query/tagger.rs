//! Destination tagging.
//!
//! Decides, per query, which projection to apply and whether results are
//! scoped to one destination or span every destination the cache holds.
//!
//! # Projection rule
//!
//! Without an explicit projection the two bookkeeping fields are hidden.
//! With one, only the first listed field other than `_id` is inspected: if it
//! is an exclusion the bookkeeping fields are excluded too, otherwise the
//! projection is left as given. A projection such as `{a: 1, b: 0}` is a
//! caller error and is not normalised here.

use crate::document::{DestinationKey, BOOKKEEPING_FIELDS, DESTINATIONS_FIELD};

use super::options::FindOptions;
use super::projection::{FieldMode, FieldProjection};
use super::selector::Selector;
use super::sort::SortSpec;

/// Shape of the result the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// A cursor over every matching document.
    Many,
    /// A point lookup returning at most one document.
    One,
}

/// What the cache knows about destinations when a query is shaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationScope {
    /// The cache was built to always search all destinations.
    pub search_in_all: bool,
    /// The destination results are scoped to when not searching all.
    pub destination: Option<DestinationKey>,
}

/// A query ready to run against the cache store.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedQuery {
    pub selector: Selector,
    pub projection: FieldProjection,
    pub limit: Option<usize>,
    pub sort: Option<SortSpec>,
    pub in_all: bool,
}

/// Resolves the effective projection from the caller's `fields`.
pub fn default_projection(fields: Option<FieldProjection>) -> FieldProjection {
    match fields {
        None => BOOKKEEPING_FIELDS
            .iter()
            .fold(FieldProjection::new(), |p, field| p.exclude(*field)),
        Some(mut projection) => {
            if projection.leading_mode() == Some(FieldMode::Exclude) {
                for field in BOOKKEEPING_FIELDS {
                    projection.set(field, FieldMode::Exclude);
                }
            }
            projection
        }
    }
}

/// An explicit `in_all` always wins; otherwise point lookups and caches built
/// with `search_in_all` span every destination.
pub fn resolve_in_all(in_all: Option<bool>, kind: QueryKind, search_in_all: bool) -> bool {
    in_all.unwrap_or(kind == QueryKind::One || search_in_all)
}

/// Picks the first destination that is set: the current parameter, then the
/// subscription's active destination, then the pending next parameter.
pub fn resolve_destination(
    current: Option<DestinationKey>,
    active: Option<DestinationKey>,
    next: Option<DestinationKey>,
) -> Option<DestinationKey> {
    current.or(active).or(next)
}

/// Applies the projection and destination rules to a caller's query.
pub fn shape_query(
    selector: Selector,
    options: FindOptions,
    kind: QueryKind,
    scope: &DestinationScope,
) -> ShapedQuery {
    let in_all = resolve_in_all(options.in_all, kind, scope.search_in_all);

    let selector = match (&scope.destination, in_all) {
        // The caller's own constraint on destinations takes precedence.
        (Some(key), false) if !selector.constrains(DESTINATIONS_FIELD) => {
            selector.and_eq(DESTINATIONS_FIELD, key)
        }
        _ => selector,
    };

    let limit = match kind {
        QueryKind::One => Some(1),
        QueryKind::Many => options.limit,
    };

    ShapedQuery {
        selector,
        projection: default_projection(options.fields),
        limit,
        sort: options.sort,
        in_all,
    }
}
