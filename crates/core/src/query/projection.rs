use serde_json::Value;

use crate::document::{Document, ID_FIELD};

use super::error::{QueryError, Result};

/// Whether a projected field is kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    Include,
    Exclude,
}

/// An ordered field projection (`{name: 1}` or `{secret: 0}`).
///
/// Order matters: the first listed field other than `_id` decides the style
/// the destination tagger sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldProjection {
    fields: Vec<(String, FieldMode)>,
}

impl FieldProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, field: impl Into<String>) -> Self {
        self.set(field, FieldMode::Include);
        self
    }

    pub fn exclude(mut self, field: impl Into<String>) -> Self {
        self.set(field, FieldMode::Exclude);
        self
    }

    /// Sets the mode for `field`, keeping its original position if listed.
    pub fn set(&mut self, field: impl Into<String>, mode: FieldMode) {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(existing) => existing.1 = mode,
            None => self.fields.push((field, mode)),
        }
    }

    pub fn mode_of(&self, field: &str) -> Option<FieldMode> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, mode)| *mode)
    }

    /// Mode of the first listed field other than `_id`.
    pub fn leading_mode(&self) -> Option<FieldMode> {
        self.fields
            .iter()
            .find(|(name, _)| name != ID_FIELD)
            .map(|(_, mode)| *mode)
    }

    /// True when any field other than `_id` is included.
    pub fn is_inclusion(&self) -> bool {
        self.fields
            .iter()
            .any(|(name, mode)| name != ID_FIELD && *mode == FieldMode::Include)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldMode)> {
        self.fields.iter().map(|(name, mode)| (name.as_str(), *mode))
    }

    /// Projects top-level fields of `doc`.
    ///
    /// Inclusion projections keep `_id` unless it is explicitly excluded.
    pub fn apply(&self, doc: &Document) -> Document {
        if self.is_inclusion() {
            let keep_id = self.mode_of(ID_FIELD) != Some(FieldMode::Exclude);
            doc.iter()
                .filter(|(key, _)| {
                    if key.as_str() == ID_FIELD {
                        keep_id
                    } else {
                        self.mode_of(key) == Some(FieldMode::Include)
                    }
                })
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        } else {
            doc.iter()
                .filter(|(key, _)| self.mode_of(key) != Some(FieldMode::Exclude))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        }
    }

    /// Parses `{field: 0|1|bool}`, preserving the listed order.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(QueryError::InvalidOption {
                option: "fields".to_string(),
                reason: "expected an object".to_string(),
            });
        };

        let mut projection = Self::new();
        for (field, flag) in map {
            let mode = match flag {
                Value::Bool(true) => FieldMode::Include,
                Value::Bool(false) => FieldMode::Exclude,
                Value::Number(n) if n.as_f64() == Some(1.0) => FieldMode::Include,
                Value::Number(n) if n.as_f64() == Some(0.0) => FieldMode::Exclude,
                _ => return Err(QueryError::InvalidProjection(field.clone())),
            };
            projection.set(field.clone(), mode);
        }
        Ok(projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        json!({"_id": "a", "x": 1, "y": 2, "destinations": ["s1"]})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_exclusion_drops_listed_fields() {
        let projection = FieldProjection::new().exclude("y").exclude("destinations");

        let projected = projection.apply(&doc());

        assert_eq!(Value::Object(projected), json!({"_id": "a", "x": 1}));
    }

    #[test]
    fn test_inclusion_keeps_id_by_default() {
        let projection = FieldProjection::new().include("x");

        assert_eq!(Value::Object(projection.apply(&doc())), json!({"_id": "a", "x": 1}));
    }

    #[test]
    fn test_inclusion_can_drop_id() {
        let projection = FieldProjection::new().exclude("_id").include("x");

        assert_eq!(Value::Object(projection.apply(&doc())), json!({"x": 1}));
        assert_eq!(projection.leading_mode(), Some(FieldMode::Include));
    }

    #[test]
    fn test_empty_projection_is_identity() {
        assert_eq!(FieldProjection::new().apply(&doc()), doc());
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut projection = FieldProjection::new().include("x").include("y");
        projection.set("x", FieldMode::Exclude);

        let listed: Vec<_> = projection.iter().collect();
        assert_eq!(
            listed,
            vec![("x", FieldMode::Exclude), ("y", FieldMode::Include)]
        );
    }

    #[test]
    fn test_from_value_preserves_order() {
        let projection = FieldProjection::from_value(&json!({"b": 0, "a": 1})).unwrap();

        assert_eq!(projection.leading_mode(), Some(FieldMode::Exclude));
        assert_eq!(projection.len(), 2);
    }

    #[test]
    fn test_from_value_rejects_other_flags() {
        let err = FieldProjection::from_value(&json!({"a": 2})).unwrap_err();
        assert_eq!(err, QueryError::InvalidProjection("a".to_string()));
    }
}
