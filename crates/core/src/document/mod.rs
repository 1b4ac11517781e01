mod ordering;
mod types;

pub use ordering::{compare_values, lookup_path, values_equal};
pub use types::{
    shadowed_fields, CacheEntry, DestinationKey, DestinationSet, Document, DocumentId,
    BOOKKEEPING_FIELDS, DESTINATIONS_FIELD, ID_FIELD, LAST_UPDATE_AT_FIELD,
};
