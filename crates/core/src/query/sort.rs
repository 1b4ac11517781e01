use std::cmp::Ordering;

use serde_json::Value;

use crate::document::{compare_values, lookup_path, Document};

use super::error::{QueryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Multi-key sort specification. Missing fields sort as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<(String, SortOrder)>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(mut self, path: impl Into<String>) -> Self {
        self.keys.push((path.into(), SortOrder::Ascending));
        self
    }

    pub fn desc(mut self, path: impl Into<String>) -> Self {
        self.keys.push((path.into(), SortOrder::Descending));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (path, order) in &self.keys {
            let left = lookup_path(a, path).unwrap_or(&Value::Null);
            let right = lookup_path(b, path).unwrap_or(&Value::Null);
            let ord = match order {
                SortOrder::Ascending => compare_values(left, right),
                SortOrder::Descending => compare_values(right, left),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Stable in-place sort.
    pub fn sort(&self, docs: &mut [Document]) {
        if self.is_empty() {
            return;
        }
        docs.sort_by(|a, b| self.compare(a, b));
    }

    /// Parses `{field: 1|-1|"asc"|"desc"}`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(QueryError::InvalidOption {
                option: "sort".to_string(),
                reason: "expected an object".to_string(),
            });
        };

        let mut spec = Self::new();
        for (path, order) in map {
            let order = match order {
                Value::Number(n) if n.as_f64() == Some(1.0) => SortOrder::Ascending,
                Value::Number(n) if n.as_f64() == Some(-1.0) => SortOrder::Descending,
                Value::String(s) if s == "asc" => SortOrder::Ascending,
                Value::String(s) if s == "desc" => SortOrder::Descending,
                _ => return Err(QueryError::InvalidSort(path.clone())),
            };
            spec.keys.push((path.clone(), order));
        }
        Ok(spec)
    }
}
