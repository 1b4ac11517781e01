use serde_json::Value;

use super::error::{QueryError, Result};
use super::projection::FieldProjection;
use super::sort::SortSpec;

/// Options accepted by `find` and `find_one`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Field projection. `None` hides the bookkeeping fields.
    pub fields: Option<FieldProjection>,
    pub limit: Option<usize>,
    pub sort: Option<SortSpec>,
    /// Search every destination instead of the current one. `None` lets the
    /// cache decide.
    pub in_all: Option<bool>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields(mut self, fields: FieldProjection) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_in_all(mut self, in_all: bool) -> Self {
        self.in_all = Some(in_all);
        self
    }

    /// Parses `{fields, limit, sort, inAll}`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => {
                return Err(QueryError::InvalidOption {
                    option: "options".to_string(),
                    reason: "expected an object".to_string(),
                })
            }
        };

        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "fields" => options.fields = Some(FieldProjection::from_value(value)?),
                "sort" => options.sort = Some(SortSpec::from_value(value)?),
                "limit" => {
                    let limit = value.as_u64().ok_or_else(|| QueryError::InvalidOption {
                        option: "limit".to_string(),
                        reason: "expected a non-negative integer".to_string(),
                    })?;
                    options.limit = Some(limit as usize);
                }
                "inAll" => {
                    let in_all = value.as_bool().ok_or_else(|| QueryError::InvalidOption {
                        option: "inAll".to_string(),
                        reason: "expected a boolean".to_string(),
                    })?;
                    options.in_all = Some(in_all);
                }
                other => return Err(QueryError::UnknownOption(other.to_string())),
            }
        }
        Ok(options)
    }
}
