//! Tolerant parsing of provider output into raw question records.
//!
//! Providers are asked for strict JSON but routinely wrap it in markdown
//! fences, prose, or a different envelope. Parsing is a sequence of ordered
//! strategies, each returning an optional result:
//!
//! 1. strip markdown fencing (json-tagged blocks preferred over bare ones);
//! 2. parse the text as JSON, recovering by slicing the outermost `{...}`
//!    and then the outermost `[...]`;
//! 3. locate the question array inside the parsed envelope.
//!
//! The first slice that parses into a known envelope wins.

use serde::Deserialize;
use serde_json::Value;

/// One question element as emitted by a provider, before validation.
///
/// Every field is kept as loose JSON so a single odd field does not discard
/// the whole element; the normalizer decides what is usable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    #[serde(default, rename = "type")]
    pub kind: Option<Value>,
    #[serde(default, alias = "question")]
    pub stem: Option<Value>,
    #[serde(default, alias = "topic")]
    pub topic_code: Option<Value>,
    #[serde(default)]
    pub options: Option<Value>,
    #[serde(default)]
    pub correct_option_codes: Option<Value>,
    #[serde(default)]
    pub expected_answer: Option<Value>,
    #[serde(default)]
    pub keywords: Option<Value>,
    #[serde(default)]
    pub rubric: Option<Value>,
}

impl RawQuestion {
    pub fn kind_str(&self) -> Option<&str> {
        self.kind.as_ref().and_then(Value::as_str)
    }

    pub fn stem_str(&self) -> Option<&str> {
        self.stem.as_ref().and_then(Value::as_str)
    }

    pub fn topic_str(&self) -> Option<&str> {
        self.topic_code.as_ref().and_then(Value::as_str)
    }

    pub fn expected_answer_str(&self) -> Option<&str> {
        self.expected_answer.as_ref().and_then(Value::as_str)
    }
}

type PayloadStrategy = fn(&Value) -> Option<&Vec<Value>>;

/// Envelope shapes, in the order they are tried.
const PAYLOAD_STRATEGIES: &[PayloadStrategy] = &[
    |v| v.as_array(),
    |v| v.get("questions").and_then(Value::as_array),
    |v| v.get("items").and_then(Value::as_array),
    |v| v.pointer("/data/questions").and_then(Value::as_array),
    |v| v.pointer("/data/items").and_then(Value::as_array),
];

type RecoveryStrategy = fn(&str) -> Option<&str>;

/// Text slices tried as JSON documents, in order.
const RECOVERY_STRATEGIES: &[RecoveryStrategy] = &[
    |text| Some(text),
    |text| outermost_slice(text, '{', '}'),
    |text| outermost_slice(text, '[', ']'),
];

/// Parse free-form provider text into raw question records.
///
/// Returns an empty list when nothing usable can be recovered.
pub fn parse_questions_text(text: &str) -> Vec<RawQuestion> {
    let plain = strip_markdown_fence(text);
    RECOVERY_STRATEGIES
        .iter()
        .filter_map(|strategy| strategy(plain.as_str()))
        .filter_map(|slice| serde_json::from_str::<Value>(slice).ok())
        .find_map(|document| extract_questions(&document))
        .unwrap_or_default()
}

/// Find the question array inside a parsed document.
///
/// Returns `None` when the document has none of the known envelope shapes.
pub fn extract_questions(document: &Value) -> Option<Vec<RawQuestion>> {
    PAYLOAD_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(document))
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| serde_json::from_value::<RawQuestion>(item.clone()).ok())
                .collect()
        })
}

fn outermost_slice(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Fenced blocks as `(language tag, body)`. An unclosed final block is kept
/// when it has content.
fn fenced_blocks(text: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut open: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        let fence = line.trim().strip_prefix("```");
        match (open.take(), fence) {
            (None, Some(tag)) => {
                open = Some((tag.trim_matches('`').trim().to_ascii_lowercase(), Vec::new()));
            }
            (None, None) => {}
            (Some((tag, body)), Some(rest)) if rest.trim().is_empty() => {
                blocks.push((tag, body.join("\n")));
            }
            (Some((tag, mut body)), _) => {
                body.push(line);
                open = Some((tag, body));
            }
        }
    }
    if let Some((tag, body)) = open.filter(|(_, body)| !body.is_empty()) {
        blocks.push((tag, body.join("\n")));
    }
    blocks
}

/// The payload of a fenced response: the first `json` block, else the first
/// untagged block, else the whole text. Always trimmed.
pub fn strip_markdown_fence(response: &str) -> String {
    let blocks = fenced_blocks(response);
    let tagged = |wanted: &str| blocks.iter().find(|(tag, _)| tag == wanted);
    tagged("json")
        .or_else(|| tagged(""))
        .map(|(_, body)| body.trim().to_string())
        .unwrap_or_else(|| response.trim().to_string())
}
