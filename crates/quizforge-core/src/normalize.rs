//! Validation and repair of provider questions.
//!
//! Every question leaving this module is gradable: choice questions carry at
//! least two options and a proper, non-empty subset of correct codes; open
//! questions carry keywords, an expected answer and a rubric. Choice questions
//! that fail validation are replaced wholesale by the fallback question for
//! their slot.

use std::collections::HashSet;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::fallback::build_question;
use crate::model::{CanonicalQuestion, OptionDraft, QuestionType, RubricCriterion};
use crate::parser::RawQuestion;
use crate::topics::{is_placeholder, normalize_topic};
use crate::traits::SourceRequest;

/// Keywords kept per open question.
pub const MAX_KEYWORDS: usize = 8;

/// Options kept per choice question, one per letter code.
pub const MAX_OPTIONS: usize = 26;

/// Content hash used for future deduplication: `sha256(topic ":" lowercase(stem))`.
pub fn fingerprint(topic_code: &str, stem: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(topic_code.as_bytes());
    hasher.update(b":");
    hasher.update(stem.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Topic for slot `index`: the provider's own unless absent or a placeholder.
pub fn slot_topic(raw: Option<&str>, topics: &[String], index: usize) -> String {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() || is_placeholder(raw) {
        round_robin_topic(topics, index)
    } else {
        normalize_topic(raw)
    }
}

fn round_robin_topic(topics: &[String], index: usize) -> String {
    if topics.is_empty() {
        return String::new();
    }
    topics[index % topics.len()].clone()
}

/// Normalize parsed provider output; entries without a known type or a stem
/// are dropped.
pub fn normalize_questions(raw: &[RawQuestion], request: &SourceRequest) -> Vec<CanonicalQuestion> {
    raw.iter()
        .enumerate()
        .filter_map(|(index, question)| normalize_question(question, index, request))
        .collect()
}

fn normalize_question(
    raw: &RawQuestion,
    index: usize,
    request: &SourceRequest,
) -> Option<CanonicalQuestion> {
    let kind = raw.kind_str().and_then(QuestionType::from_loose)?;
    let stem = raw.stem_str().map(str::trim).filter(|s| !s.is_empty())?;
    let topic_code = slot_topic(raw.topic_str(), &request.topics, index);
    let locale = request.locale();

    if kind == QuestionType::OpenShort {
        let keywords = parse_keywords(raw.keywords.as_ref());
        let expected_answer = raw
            .expected_answer_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| locale.default_expected_answer(&topic_code));
        let rubric = parse_rubric(raw.rubric.as_ref());
        return Some(CanonicalQuestion {
            kind,
            fingerprint: fingerprint(&topic_code, stem),
            stem: stem.to_string(),
            keywords: if keywords.is_empty() {
                locale.default_keywords(&topic_code)
            } else {
                keywords
            },
            topic_code,
            difficulty: request.difficulty,
            options: Vec::new(),
            correct_option_codes: Vec::new(),
            expected_answer: Some(expected_answer),
            rubric: Some(if rubric.is_empty() {
                locale.default_rubric()
            } else {
                rubric
            }),
        });
    }

    let mut options = parse_options(raw.options.as_ref());
    let codes: HashSet<&str> = options.iter().map(|o| o.code.as_str()).collect();
    let mut correct = explicit_correct_codes(raw.correct_option_codes.as_ref())
        .into_iter()
        .filter(|code| codes.contains(code.as_str()))
        .collect::<Vec<_>>();
    if correct.is_empty() {
        correct = options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.code.clone())
            .collect();
    }

    if !is_valid_choice(kind, options.len(), correct.len()) {
        tracing::debug!(
            index,
            kind = %kind,
            options = options.len(),
            correct = correct.len(),
            "choice question failed validation, using fallback for slot"
        );
        return Some(build_question(
            &topic_code,
            kind,
            request.difficulty,
            index,
            &request.subject_name,
            locale,
        ));
    }

    for option in &mut options {
        option.is_correct = correct.contains(&option.code);
    }

    Some(CanonicalQuestion {
        kind,
        fingerprint: fingerprint(&topic_code, stem),
        stem: stem.to_string(),
        topic_code,
        difficulty: request.difficulty,
        options,
        correct_option_codes: correct,
        expected_answer: None,
        keywords: Vec::new(),
        rubric: None,
    })
}

/// At least two options; correct codes a proper non-empty subset; exactly one
/// for single choice.
fn is_valid_choice(kind: QuestionType, options: usize, correct: usize) -> bool {
    let bounds = options >= 2 && correct >= 1 && correct < options;
    match kind {
        QuestionType::SingleChoice => bounds && correct == 1,
        _ => bounds,
    }
}

/// Options with non-empty text; codes default to `A`, `B`, ... by position,
/// are upper-cased and de-duplicated (first wins).
fn parse_options(value: Option<&Value>) -> Vec<OptionDraft> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    items
        .iter()
        .take(MAX_OPTIONS)
        .enumerate()
        .filter_map(|(position, item)| {
            let (code, text, is_correct) = match item {
                Value::String(text) => (None, text.as_str(), false),
                Value::Object(obj) => (
                    obj.get("code").and_then(Value::as_str),
                    obj.get("text").and_then(Value::as_str).unwrap_or_default(),
                    obj.get("isCorrect")
                        .or_else(|| obj.get("is_correct"))
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                ),
                _ => return None,
            };
            let code = code
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_uppercase)
                .or_else(|| letter_code(position))?;
            let text = text.trim();
            if text.is_empty() || !seen.insert(code.clone()) {
                return None;
            }
            Some(OptionDraft {
                code,
                text: text.to_string(),
                is_correct,
            })
        })
        .collect()
}

/// `A` through `Z`; `None` past the alphabet.
fn letter_code(position: usize) -> Option<String> {
    u8::try_from(position)
        .ok()
        .filter(|&p| usize::from(p) < MAX_OPTIONS)
        .map(|p| char::from(b'A' + p).to_string())
}

/// Explicit correct codes: a string array, or a single string.
fn explicit_correct_codes(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<&str> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(code)) => vec![code.as_str()],
        _ => Vec::new(),
    };
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty() && seen.insert(code.clone()))
        .collect()
}

fn parse_keywords(value: Option<&Value>) -> Vec<String> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(normalize_topic)
        .filter(|k| !k.is_empty())
        .take(MAX_KEYWORDS)
        .collect()
}

/// Criteria with a name and positive points; malformed rows are skipped.
fn parse_rubric(value: Option<&Value>) -> Vec<RubricCriterion> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value::<RubricCriterion>(item.clone()).ok())
        .filter(|c| !c.criterion.trim().is_empty() && c.max_points > 0.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Difficulty;
    use crate::parser::parse_questions_text;

    fn request() -> SourceRequest {
        SourceRequest {
            subject_name: "Programming".into(),
            subject_description: None,
            language: "en".into(),
            difficulty: Difficulty::Medium,
            question_count: 3,
            question_types: vec![QuestionType::SingleChoice],
            topics: vec!["loops".into(), "arrays".into()],
        }
    }

    fn normalize(text: &str) -> Vec<CanonicalQuestion> {
        normalize_questions(&parse_questions_text(text), &request())
    }

    #[test]
    fn fingerprint_is_sha256_of_topic_and_lowercase_stem() {
        let a = fingerprint("loops", "What Is A Loop?");
        let b = fingerprint("loops", "what is a loop?");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint("arrays", "what is a loop?"));
    }

    #[test]
    fn valid_single_choice_is_kept() {
        let qs = normalize(
            r#"{"questions":[{"type":"single","stem":" Pick one ","topicCode":"syntax",
               "options":[{"code":"a","text":"x"},{"code":"b","text":"y"}],
               "correctOptionCodes":["B"]}]}"#,
        );
        assert_eq!(qs.len(), 1);
        let q = &qs[0];
        assert_eq!(q.stem, "Pick one");
        assert_eq!(q.topic_code, "syntax");
        assert_eq!(q.correct_option_codes, vec!["B"]);
        assert!(q.options[1].is_correct);
        assert!(!q.options[0].is_correct);
        assert_eq!(q.fingerprint, fingerprint("syntax", "Pick one"));
    }

    #[test]
    fn option_list_is_capped_at_the_alphabet() {
        let options: Vec<String> = (0..30).map(|i| format!(r#"{{"text":"option {i}"}}"#)).collect();
        let text = format!(
            r#"[{{"type":"SINGLE_CHOICE","stem":"Pick","options":[{}],"correctOptionCodes":["Z"]}}]"#,
            options.join(",")
        );
        let qs = normalize(&text);
        let q = &qs[0];
        assert_eq!(q.stem, "Pick");
        assert_eq!(q.options.len(), MAX_OPTIONS);
        assert_eq!(q.options[25].code, "Z");
        assert!(q
            .options
            .iter()
            .all(|o| o.code.len() == 1 && o.code.chars().all(|c| c.is_ascii_uppercase())));
        assert_eq!(q.correct_option_codes, vec!["Z"]);
    }

    #[test]
    fn letter_codes_stop_after_z() {
        assert_eq!(letter_code(0).as_deref(), Some("A"));
        assert_eq!(letter_code(25).as_deref(), Some("Z"));
        assert_eq!(letter_code(26), None);
        assert_eq!(letter_code(300), None);
    }

    #[test]
    fn correct_codes_inferred_from_flags_and_codes_defaulted() {
        let qs = normalize(
            r#"[{"type":"MULTI_CHOICE","stem":"Pick two","options":[
                {"text":"one","isCorrect":true},{"text":"two","isCorrect":true},{"text":"three"}]}]"#,
        );
        let q = &qs[0];
        assert_eq!(q.kind, QuestionType::MultiChoice);
        assert_eq!(q.correct_option_codes, vec!["A", "B"]);
        assert_eq!(q.options[2].code, "C");
        assert_eq!(q.topic_code, "loops");
    }

    #[test]
    fn unknown_type_and_missing_stem_are_dropped() {
        let qs = normalize(
            r#"[{"type":"essay","stem":"x"},{"type":"open"},{"type":"open","stem":"Explain"}]"#,
        );
        assert_eq!(qs.len(), 1);
        // Index 2 in the raw list, so round-robin picks topics[0].
        assert_eq!(qs[0].topic_code, "loops");
    }

    #[test]
    fn invalid_choice_is_replaced_by_fallback() {
        let qs = normalize(
            r#"[{"type":"SINGLE_CHOICE","stem":"Only one option","topicCode":"general",
                 "options":[{"code":"A","text":"lonely","isCorrect":true}]},
                {"type":"SINGLE_CHOICE","stem":"Two correct","options":[
                 {"text":"a","isCorrect":true},{"text":"b","isCorrect":true},{"text":"c"}]},
                {"type":"MULTI_CHOICE","stem":"All correct","options":[
                 {"text":"a"},{"text":"b"}],"correctOptionCodes":["A","B"]}]"#,
        );
        assert_eq!(qs.len(), 3);
        for (index, q) in qs.iter().enumerate() {
            assert_eq!(q.options.len(), 4, "slot {index}");
            assert_ne!(q.stem, "Only one option");
        }
        assert_eq!(qs[0].topic_code, "loops");
        assert_eq!(qs[1].correct_option_codes.len(), 1);
        assert_eq!(qs[2].correct_option_codes.len(), 2);
    }

    #[test]
    fn correct_codes_outside_options_are_ignored() {
        let qs = normalize(
            r#"[{"type":"SINGLE_CHOICE","stem":"Q","options":[
                {"code":"A","text":"a"},{"code":"B","text":"b","isCorrect":true}],
                "correctOptionCodes":["Z"]}]"#,
        );
        assert_eq!(qs[0].correct_option_codes, vec!["B"]);
        assert_eq!(qs[0].stem, "Q");
    }

    #[test]
    fn open_question_defaults() {
        let qs = normalize(r#"[{"type":"OPEN_SHORT","stem":"Explain loops","rubric":"lots"}]"#);
        let q = &qs[0];
        assert_eq!(q.keywords, vec!["loops", "definition", "example"]);
        assert_eq!(q.max_points(), 5.0);
        assert!(q.expected_answer.as_deref().unwrap().contains("loops"));
    }

    #[test]
    fn open_question_keeps_provider_fields() {
        let qs = normalize(
            r#"[{"type":"open","stem":"Explain","topicCode":"  while   loops ",
                 "expectedAnswer":"Repeats while true",
                 "keywords":["condition"," body ",3,""],
                 "rubric":[{"criterion":"Accuracy","maxPoints":4},{"criterion":"","maxPoints":1}]}]"#,
        );
        let q = &qs[0];
        assert_eq!(q.topic_code, "while loops");
        assert_eq!(q.keywords, vec!["condition", "body"]);
        assert_eq!(q.max_points(), 4.0);
        assert_eq!(q.expected_answer.as_deref(), Some("Repeats while true"));
    }

    #[test]
    fn duplicate_option_codes_keep_first() {
        let qs = normalize(
            r#"[{"type":"single","stem":"Q","options":[
                {"code":"A","text":"first","isCorrect":true},{"code":"a","text":"dup"},{"code":"B","text":"b"}]}]"#,
        );
        let texts: Vec<_> = qs[0].options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "b"]);
    }
}
