//! Pretty output formatting.

use serde_json::Value;
use subcache_core::document::{Document, ID_FIELD};

use crate::simulation::{Action, Snapshot, Summary};

/// Format a step action as one line.
pub fn format_action(action: &Action) -> String {
    match action {
        Action::Inserted { id } => format!("inserted {id}"),
        Action::Updated { id, score } => format!("updated {id} score={score}"),
        Action::Removed { id } => format!("removed {id}"),
        Action::Switched { from, to } => match from {
            Some(from) => format!("switched {from} -> {to}"),
            None => format!("switched to {to}"),
        },
    }
}

/// Format one document as `id key=value ...`.
pub fn format_document(doc: &Document) -> String {
    let id = match doc.get(ID_FIELD) {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => "?".to_string(),
    };
    let mut output = id;
    for (key, value) in doc {
        if key == ID_FIELD {
            continue;
        }
        match value {
            Value::String(s) => output.push_str(&format!(" {key}={s}")),
            other => output.push_str(&format!(" {key}={other}")),
        }
    }
    output
}

fn format_view(title: &str, docs: &[Document]) -> String {
    if docs.is_empty() {
        return format!("  {title}: (empty)");
    }
    let mut output = format!("  {title} ({})", docs.len());
    for doc in docs {
        output.push_str(&format!("\n    {}", format_document(doc)));
    }
    output
}

/// Format a snapshot for display.
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let destination = snapshot
        .destination
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string());

    let mut output = format!("TICK {} | {}\n", snapshot.tick, format_action(&snapshot.action));
    output.push_str(&"-".repeat(40));
    output.push_str(&format!(
        "\n  destination: {destination}  observing: {}  consumers: {}  cached: {}\n",
        snapshot.observing, snapshot.consumers, snapshot.cached
    ));
    output.push_str(&format_view("scoped", &snapshot.scoped));
    output.push('\n');
    output.push_str(&format_view("all", &snapshot.in_all));
    output
}

/// Format the end-of-run summary for display.
pub fn format_summary(summary: &Summary) -> String {
    format!(
        "SUMMARY\n  Ticks: {}\n  Observer attached: {}\n  Parent observers: {}\n  Cached entries: {}\n  Consumer runs: {}",
        summary.ticks,
        summary.observing,
        summary.parent_observers,
        summary.cached,
        summary.consumer_runs
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_action() {
        assert_eq!(
            format_action(&Action::Switched {
                from: Some("s1".into()),
                to: "s2".into()
            }),
            "switched s1 -> s2"
        );
        assert_eq!(
            format_action(&Action::Updated {
                id: "a".into(),
                score: 4
            }),
            "updated a score=4"
        );
    }

    #[test]
    fn test_format_document() {
        let doc = json!({"_id": "a", "title": "doc-001", "score": 7})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(format_document(&doc), "a title=doc-001 score=7");
    }

    #[test]
    fn test_format_empty_view() {
        assert_eq!(format_view("scoped", &[]), "  scoped: (empty)");
    }
}
