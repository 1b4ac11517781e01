//! Query shaping for the cache: selectors, projections, sorts, options and
//! destination tagging.

mod error;
mod options;
mod projection;
mod selector;
mod sort;
mod tagger;

pub use error::{QueryError, Result};
pub use options::FindOptions;
pub use projection::{FieldMode, FieldProjection};
pub use selector::{Clause, Condition, Selector};
pub use sort::{SortOrder, SortSpec};
pub use tagger::{
    default_projection, resolve_destination, resolve_in_all, shape_query, DestinationScope,
    QueryKind, ShapedQuery,
};
