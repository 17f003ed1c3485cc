//! Topic code resolution.
//!
//! Explicit caller topics win; otherwise topics are inferred from the
//! subject's syllabus, then from keywords in the subject name, and finally
//! from a fixed locale-specific default list.

use std::collections::HashSet;

use serde_json::Value;

use crate::locale::Locale;

/// Upper bound on the number of topics a test cycles through.
pub const MAX_TOPICS: usize = 8;

const MAX_TOPIC_CHARS: usize = 80;

const PLACEHOLDER_TOPICS: &[&str] = &["core", "general", "topic", "default", "main"];

/// Trim, collapse inner whitespace and cap the length of a topic code.
pub fn normalize_topic(value: &str) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_TOPIC_CHARS).collect::<String>().trim().to_string()
}

/// Human-readable label: `loop_invariants` becomes `loop invariants`.
pub fn topic_label(value: &str) -> String {
    normalize_topic(value)
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generic codes a provider emits when it has no real topic in mind.
pub fn is_placeholder(value: &str) -> bool {
    let squashed: String = value
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    PLACEHOLDER_TOPICS.contains(&squashed.as_str())
}

/// Normalize and de-duplicate case-insensitively, keeping first-seen order.
pub fn unique_topics<I, S>(topics: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for topic in topics {
        let normalized = normalize_topic(topic.as_ref());
        if normalized.is_empty() {
            continue;
        }
        if seen.insert(normalized.to_lowercase()) {
            result.push(normalized);
        }
    }
    result
}

/// Pull topic labels out of a syllabus outline.
///
/// The outline is an array whose rows are either strings or objects carrying
/// one of `topicCode`, `topic`, `name` or `title`.
pub fn topics_from_syllabus(syllabus: &Value) -> Vec<String> {
    let Some(rows) = syllabus.as_array() else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| match row {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => ["topicCode", "topic", "name", "title"]
                .iter()
                .filter_map(|key| obj.get(*key).and_then(Value::as_str))
                .find(|s| !s.is_empty())
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

/// Derive topic variants from the words of a subject name.
///
/// Words are lower-cased with punctuation stripped; only words of at least
/// three characters count, and the first two form the base.
pub fn topics_from_subject_name(subject_name: &str, locale: Locale) -> Vec<String> {
    let cleaned: String = subject_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() >= 3)
        .collect();
    if words.is_empty() {
        return Vec::new();
    }
    let base = words.iter().take(2).copied().collect::<Vec<_>>().join(" ");
    locale.subject_topic_variants(&base)
}

/// Resolve the ordered topic list a test cycles through.
pub fn resolve_topics(
    explicit: &[String],
    syllabus: Option<&Value>,
    subject_name: &str,
    locale: Locale,
) -> Vec<String> {
    let explicit: Vec<String> = unique_topics(explicit)
        .into_iter()
        .filter(|t| !is_placeholder(t))
        .collect();
    if !explicit.is_empty() {
        return explicit.into_iter().take(MAX_TOPICS).collect();
    }

    let mut inferred: Vec<String> = syllabus
        .map(topics_from_syllabus)
        .map(unique_topics)
        .unwrap_or_default()
        .into_iter()
        .filter(|t| !is_placeholder(t))
        .collect();
    if inferred.is_empty() {
        inferred = unique_topics(topics_from_subject_name(subject_name, locale))
            .into_iter()
            .filter(|t| !is_placeholder(t))
            .collect();
    }

    match inferred.len() {
        0 => locale.default_topics(),
        1 => locale.single_topic_variants(&inferred[0]),
        _ => inferred.into_iter().take(MAX_TOPICS).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn explicit_topics_are_deduplicated_and_capped() {
        let explicit = strings(&[
            "Loops", "loops", " general ", "arrays", "a", "b", "c", "d", "e", "f", "g", "h",
        ]);
        let topics = resolve_topics(&explicit, None, "Ignored", Locale::En);
        assert_eq!(topics.len(), MAX_TOPICS);
        assert_eq!(topics[0], "Loops");
        assert_eq!(topics[1], "arrays");
        assert!(!topics.iter().any(|t| t == "general"));
    }

    #[test]
    fn placeholder_only_explicit_falls_through_to_subject() {
        let explicit = strings(&["core", "Main", "default"]);
        let topics = resolve_topics(&explicit, None, "Физика", Locale::Ru);
        assert_eq!(
            topics,
            strings(&["физика", "физика практика", "физика типичные ошибки"])
        );
    }

    #[test]
    fn syllabus_rows_of_mixed_shape() {
        let syllabus = json!([
            "Kinematics",
            {"topicCode": "dynamics"},
            {"title": "Energy"},
            {"unrelated": 1},
            42
        ]);
        let topics = resolve_topics(&[], Some(&syllabus), "Physics", Locale::En);
        assert_eq!(topics, strings(&["Kinematics", "dynamics", "Energy"]));
    }

    #[test]
    fn single_inferred_topic_gets_variants() {
        let syllabus = json!(["Optics"]);
        let topics = resolve_topics(&[], Some(&syllabus), "Physics", Locale::En);
        assert_eq!(topics, strings(&["Optics", "Optics practice", "Optics cases"]));
    }

    #[test]
    fn subject_name_keywords() {
        let topics = topics_from_subject_name("Основы, сетевой безопасности!", Locale::Ru);
        assert_eq!(topics[0], "основы сетевой");
        let topics = topics_from_subject_name("Data structures and algorithms", Locale::En);
        assert_eq!(
            topics,
            strings(&[
                "data structures",
                "data structures practice",
                "data structures common mistakes"
            ])
        );
    }

    #[test]
    fn nothing_inferable_uses_locale_defaults() {
        assert_eq!(
            resolve_topics(&[], None, "IT", Locale::En),
            strings(&["basics", "practice", "pitfalls"])
        );
        assert_eq!(
            resolve_topics(&[], None, "", Locale::Ru),
            strings(&["основы", "практика", "типичные ошибки"])
        );
    }

    #[test]
    fn labels_and_placeholders() {
        assert_eq!(topic_label("loop_invariants--basics"), "loop invariants basics");
        assert!(is_placeholder(" Gen eral "));
        assert!(!is_placeholder("generics"));
        assert_eq!(normalize_topic("  a   b  "), "a b");
        assert_eq!(normalize_topic(&"x".repeat(200)).chars().count(), 80);
    }
}
