//! JSON output formatting.

/// Format a value as a single line of JSON.
pub fn format_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_json_is_single_line() {
        let output = format_json(&json!({"a": [1, 2], "b": {"c": null}}));
        assert_eq!(output, r#"{"a":[1,2],"b":{"c":null}}"#);
    }
}
