//! Value comparison and field lookup shared by selectors and sorts.
//!
//! Values of different kinds order as:
//! null < numbers < strings < objects < arrays < booleans.

use std::cmp::Ordering;

use serde_json::Value;

use super::types::Document;

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values.
///
/// Numbers compare by value regardless of their integer/float representation.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = kind_rank(a).cmp(&kind_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = compare_values(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

/// Structural equality that treats `1` and `1.0` as equal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Resolves a dotted path (`"address.city"`) through nested objects.
pub fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_order() {
        let ordered = [
            json!(null),
            json!(-5),
            json!("a"),
            json!({"k": 1}),
            json!([1]),
            json!(false),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(compare_values(&pair[0], &pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(-1.5), &json!(-2)), Ordering::Greater);
    }

    #[test]
    fn test_arrays_compare_elementwise() {
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
        assert_eq!(compare_values(&json!([1, 2]), &json!([1])), Ordering::Greater);
    }

    #[test]
    fn test_lookup_path_nested() {
        let doc = json!({"address": {"city": "Montevideo"}, "tags": ["a"]});
        let doc = doc.as_object().unwrap();

        assert_eq!(lookup_path(doc, "address.city"), Some(&json!("Montevideo")));
        assert_eq!(lookup_path(doc, "address.zip"), None);
        assert_eq!(lookup_path(doc, "tags.city"), None);
        assert_eq!(lookup_path(doc, "missing"), None);
    }
}
