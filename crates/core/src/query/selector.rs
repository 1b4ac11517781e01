//! Document selectors.
//!
//! A selector is a conjunction of clauses. Field clauses follow the usual
//! document-store conventions: a field holding an array matches a scalar
//! condition when any element matches it, which is what lets a
//! `destinations: "s1"` clause select entries tagged with `s1`.

use std::cmp::Ordering;

use serde_json::Value;

use crate::document::{compare_values, lookup_path, values_equal, Document, DocumentId, ID_FIELD};

use super::error::{QueryError, Result};

/// A single condition applied to a field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
}

impl Condition {
    fn matches(&self, field: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => eq_matches(field, expected),
            Condition::Ne(expected) => !eq_matches(field, expected),
            Condition::Gt(bound) => range_matches(field, bound, |o| o == Ordering::Greater),
            Condition::Gte(bound) => range_matches(field, bound, |o| o != Ordering::Less),
            Condition::Lt(bound) => range_matches(field, bound, |o| o == Ordering::Less),
            Condition::Lte(bound) => range_matches(field, bound, |o| o != Ordering::Greater),
            Condition::In(options) => options.iter().any(|o| eq_matches(field, o)),
            Condition::Nin(options) => !options.iter().any(|o| eq_matches(field, o)),
            Condition::Exists(expected) => field.is_some() == *expected,
        }
    }

    fn parse(operator: &str, operand: &Value) -> Result<Self> {
        let condition = match operator {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$gt" => Condition::Gt(operand.clone()),
            "$gte" => Condition::Gte(operand.clone()),
            "$lt" => Condition::Lt(operand.clone()),
            "$lte" => Condition::Lte(operand.clone()),
            "$in" => Condition::In(array_operand(operator, operand)?),
            "$nin" => Condition::Nin(array_operand(operator, operand)?),
            "$exists" => match operand {
                Value::Bool(b) => Condition::Exists(*b),
                Value::Number(n) => Condition::Exists(n.as_f64().is_some_and(|n| n != 0.0)),
                _ => {
                    return Err(QueryError::InvalidOperand {
                        operator: operator.to_string(),
                        reason: "expected a boolean".to_string(),
                    })
                }
            },
            other => return Err(QueryError::UnknownOperator(other.to_string())),
        };
        Ok(condition)
    }
}

fn array_operand(operator: &str, operand: &Value) -> Result<Vec<Value>> {
    match operand {
        Value::Array(values) => Ok(values.clone()),
        _ => Err(QueryError::InvalidOperand {
            operator: operator.to_string(),
            reason: "expected an array".to_string(),
        }),
    }
}

fn eq_matches(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        // A missing field equals null.
        None => expected.is_null(),
        Some(value) if values_equal(value, expected) => true,
        Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, expected)),
        Some(_) => false,
    }
}

fn range_matches(field: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let comparable = |value: &Value| {
        let same_kind = matches!(
            (value, bound),
            (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_))
        );
        same_kind && accept(compare_values(value, bound))
    };

    match field {
        None => false,
        Some(Value::Array(items)) => items.iter().any(comparable),
        Some(value) => comparable(value),
    }
}

/// One clause of a selector.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Every condition must hold for the value at `path`.
    Field {
        path: String,
        conditions: Vec<Condition>,
    },
    /// Every nested selector must match.
    And(Vec<Selector>),
    /// At least one nested selector must match.
    Or(Vec<Selector>),
}

impl Clause {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Clause::Field { path, conditions } => {
                let value = lookup_path(doc, path);
                conditions.iter().all(|c| c.matches(value))
            }
            Clause::And(selectors) => selectors.iter().all(|s| s.matches(doc)),
            Clause::Or(selectors) => selectors.iter().any(|s| s.matches(doc)),
        }
    }
}

/// A conjunction of clauses. The empty selector matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    clauses: Vec<Clause>,
}

impl Selector {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches the document with the given identity.
    pub fn by_id(id: impl Into<DocumentId>) -> Self {
        Self::eq(ID_FIELD, id.into().as_str())
    }

    /// Matches documents whose `path` equals (or, for arrays, contains) `value`.
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(path, value)
    }

    /// Adds an equality clause.
    pub fn and_eq(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(path, Condition::Eq(value.into()))
    }

    /// Adds a field clause with a single condition.
    pub fn with(mut self, path: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push(Clause::Field {
            path: path.into(),
            conditions: vec![condition],
        });
        self
    }

    /// Adds an arbitrary clause.
    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Returns true if a top-level field clause constrains `path`.
    pub fn constrains(&self, path: &str) -> bool {
        self.clauses
            .iter()
            .any(|c| matches!(c, Clause::Field { path: p, .. } if p == path))
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|c| c.matches(doc))
    }

    /// Parses a selector from its JSON form.
    ///
    /// `null` selects everything and a bare string selects by `_id`.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::all()),
            Value::String(id) => Ok(Self::by_id(id.as_str())),
            Value::Object(map) => {
                let mut selector = Self::all();
                for (key, operand) in map {
                    selector.clauses.push(parse_clause(key, operand)?);
                }
                Ok(selector)
            }
            other => Err(QueryError::InvalidSelector(other.to_string())),
        }
    }
}

fn parse_clause(key: &str, operand: &Value) -> Result<Clause> {
    match key {
        "$and" => Ok(Clause::And(parse_nested(key, operand)?)),
        "$or" => Ok(Clause::Or(parse_nested(key, operand)?)),
        op if op.starts_with('$') => Err(QueryError::UnknownOperator(op.to_string())),
        path => Ok(Clause::Field {
            path: path.to_string(),
            conditions: parse_conditions(operand)?,
        }),
    }
}

fn parse_nested(operator: &str, operand: &Value) -> Result<Vec<Selector>> {
    let Value::Array(items) = operand else {
        return Err(QueryError::InvalidOperand {
            operator: operator.to_string(),
            reason: "expected an array of selectors".to_string(),
        });
    };
    items.iter().map(Selector::from_value).collect()
}

fn parse_conditions(operand: &Value) -> Result<Vec<Condition>> {
    match operand {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map
            .iter()
            .map(|(operator, value)| Condition::parse(operator, value))
            .collect(),
        literal => Ok(vec![Condition::Eq(literal.clone())]),
    }
}
