use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A schemaless document as seen by selectors, sorts and projections.
pub type Document = Map<String, Value>;

/// Field holding the document identity in rendered documents.
pub const ID_FIELD: &str = "_id";

/// Bookkeeping field listing the destinations an entry is tagged with.
pub const DESTINATIONS_FIELD: &str = "destinations";

/// Bookkeeping field holding the last mutation time in epoch milliseconds.
pub const LAST_UPDATE_AT_FIELD: &str = "lastUpdateAt";

/// Fields that are stripped from query output unless explicitly requested.
pub const BOOKKEEPING_FIELDS: [&str; 2] = [DESTINATIONS_FIELD, LAST_UPDATE_AT_FIELD];

/// Stable identity of a document in the parent dataset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifies the logical subscriber scope a cached document serves.
///
/// Usually the value of a subscription parameter, but any string works,
/// including sentinels such as `"next"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationKey(String);

impl DestinationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for DestinationKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&DestinationKey> for Value {
    fn from(key: &DestinationKey) -> Self {
        Value::String(key.0.clone())
    }
}

/// Insertion-ordered set of destination keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationSet(Vec<DestinationKey>);

impl DestinationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key` unless it is already present. Returns true if it was added.
    pub fn insert(&mut self, key: DestinationKey) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.0.push(key);
        true
    }

    pub fn contains(&self, key: &DestinationKey) -> bool {
        self.0.iter().any(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DestinationKey> {
        self.0.iter()
    }
}

impl<K: Into<DestinationKey>> FromIterator<K> for DestinationSet {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(key.into());
        }
        set
    }
}

/// A cached, destination-tagged mirror of one parent document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub id: DocumentId,
    pub payload: Document,
    pub destinations: DestinationSet,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_update_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry from a freshly observed document.
    ///
    /// `to` is the destination the document was observed under; `None` leaves
    /// the entry untagged.
    pub fn new(
        id: DocumentId,
        fields: &Document,
        to: Option<DestinationKey>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            id,
            payload: Document::new(),
            destinations: DestinationSet::new(),
            last_update_at: at,
        };
        entry.merge_fields(fields);
        if let Some(to) = to {
            entry.destinations.insert(to);
        }
        entry
    }

    /// Overwrites payload fields with the ones in `fields`.
    ///
    /// The identity and bookkeeping fields are never taken from `fields`, so
    /// a parent document cannot carry its own `destinations` or
    /// `lastUpdateAt`; see [`shadowed_fields`].
    pub fn merge_fields(&mut self, fields: &Document) {
        for (key, value) in fields {
            if is_reserved(key) {
                continue;
            }
            self.payload.insert(key.clone(), value.clone());
        }
    }

    /// Applies a change set: `null` clears the field, anything else sets it.
    /// Bookkeeping field names are skipped as in [`merge_fields`](Self::merge_fields).
    pub fn apply_changes(&mut self, fields: &Document) {
        for (key, value) in fields {
            if is_reserved(key) {
                continue;
            }
            if value.is_null() {
                self.payload.remove(key);
            } else {
                self.payload.insert(key.clone(), value.clone());
            }
        }
    }

    /// Tags the entry with `key`. Returns true if the tag is new.
    pub fn tag(&mut self, key: DestinationKey) -> bool {
        self.destinations.insert(key)
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_update_at = at;
    }

    /// Renders the entry as a document with `_id` and bookkeeping fields.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        for (key, value) in &self.payload {
            doc.insert(key.clone(), value.clone());
        }
        doc.insert(
            DESTINATIONS_FIELD.to_string(),
            Value::Array(self.destinations.iter().map(Value::from).collect()),
        );
        doc.insert(
            LAST_UPDATE_AT_FIELD.to_string(),
            Value::from(self.last_update_at.timestamp_millis()),
        );
        doc
    }
}

fn is_reserved(key: &str) -> bool {
    key == ID_FIELD || BOOKKEEPING_FIELDS.contains(&key)
}

/// Names in `fields` that collide with a bookkeeping field and are dropped
/// when merged into an entry.
pub fn shadowed_fields(fields: &Document) -> Vec<&str> {
    fields
        .keys()
        .map(String::as_str)
        .filter(|key| BOOKKEEPING_FIELDS.contains(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_destination_set_ignores_duplicates() {
        let mut set = DestinationSet::new();

        assert!(set.insert("s1".into()));
        assert!(set.insert("s2".into()));
        assert!(!set.insert("s1".into()));

        assert_eq!(set.len(), 2);
        let keys: Vec<&str> = set.iter().map(DestinationKey::as_str).collect();
        assert_eq!(keys, vec!["s1", "s2"]);
    }

    #[test]
    fn test_new_entry_strips_reserved_fields() {
        let fields = doc(json!({"_id": "a", "x": 1, "destinations": ["bogus"]}));
        let entry = CacheEntry::new("a".into(), &fields, Some("s1".into()), Utc::now());

        assert_eq!(entry.payload, doc(json!({"x": 1})));
        assert_eq!(entry.destinations, ["s1"].into_iter().collect());
    }

    #[test]
    fn test_shadowed_fields() {
        let fields = doc(json!({"_id": "a", "lastUpdateAt": 5, "x": 1, "destinations": []}));
        assert_eq!(shadowed_fields(&fields), vec!["lastUpdateAt", "destinations"]);
        assert!(shadowed_fields(&doc(json!({"_id": "a", "x": 1}))).is_empty());

        let mut entry = CacheEntry::new("a".into(), &Document::new(), None, Utc::now());
        entry.apply_changes(&doc(json!({"lastUpdateAt": 5, "x": 1})));
        assert_eq!(entry.payload, doc(json!({"x": 1})));
    }

    #[test]
    fn test_new_entry_without_destination_is_untagged() {
        let entry = CacheEntry::new("a".into(), &Document::new(), None, Utc::now());
        assert!(entry.destinations.is_empty());
    }

    #[test]
    fn test_apply_changes_clears_null_fields() {
        let fields = doc(json!({"x": 1, "y": 2}));
        let mut entry = CacheEntry::new("a".into(), &fields, None, Utc::now());

        entry.apply_changes(&doc(json!({"x": 3, "y": null})));

        assert_eq!(entry.payload, doc(json!({"x": 3})));
    }

    #[test]
    fn test_merge_fields_keeps_nulls() {
        let mut entry = CacheEntry::new("a".into(), &doc(json!({"x": 1})), None, Utc::now());

        entry.merge_fields(&doc(json!({"x": null})));

        assert_eq!(entry.payload.get("x"), Some(&Value::Null));
    }

    #[test]
    fn test_to_document_renders_bookkeeping() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let mut entry = CacheEntry::new("a".into(), &doc(json!({"x": 1})), Some("s1".into()), at);
        entry.tag("s2".into());

        let rendered = entry.to_document();

        assert_eq!(
            Value::Object(rendered),
            json!({
                "_id": "a",
                "x": 1,
                "destinations": ["s1", "s2"],
                "lastUpdateAt": 1_700_000_000_000i64,
            })
        );
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let at = DateTime::from_timestamp_millis(42).unwrap();
        let entry = CacheEntry::new("a".into(), &Document::new(), Some("s1".into()), at);

        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["lastUpdateAt"], json!(42));
        assert_eq!(json["destinations"], json!(["s1"]));
        assert_eq!(json["id"], json!("a"));
    }
}
