//! Structured-generation prompt.

use crate::traits::SourceRequest;

const EXAMPLE_ELEMENT: &str = r#"{"type":"SINGLE_CHOICE","stem":"...","topicCode":"...","options":[{"code":"A","text":"..."},{"code":"B","text":"..."},{"code":"C","text":"..."},{"code":"D","text":"..."}],"correctOptionCodes":["A"]}"#;

const OPEN_EXAMPLE_ELEMENT: &str = r#"{"type":"OPEN_SHORT","stem":"...","topicCode":"...","expectedAnswer":"...","keywords":["...","..."],"rubric":[{"criterion":"...","maxPoints":3},{"criterion":"...","maxPoints":2}]}"#;

/// Build the single instruction-plus-schema prompt sent to a provider.
pub fn build_prompt(request: &SourceRequest) -> String {
    let types = request
        .question_types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let description = request
        .subject_description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("no description");

    let mut lines = vec![
        format!("You are generating a study test for the subject \"{}\".", request.subject_name),
        format!("Language of all texts: {}.", request.language),
        format!("Difficulty: {}.", request.difficulty),
        format!("Number of questions: {}.", request.question_count),
        format!("Question types: {types}."),
        format!("Topics: {}.", request.topics.join(", ")),
        format!("Subject description: {description}."),
        "Rules:".to_string(),
        "1) Return ONLY valid JSON, without markdown and without explanations.".to_string(),
        "2) The format is strictly: {\"questions\":[...]}.".to_string(),
        "3) SINGLE_CHOICE and MULTI_CHOICE require options and correctOptionCodes; SINGLE_CHOICE has exactly one correct code.".to_string(),
        "4) OPEN_SHORT requires expectedAnswer, keywords and rubric.".to_string(),
        "5) Every question carries a topicCode taken from the topic list.".to_string(),
        "6) Do not use template phrases such as \"correct statement\" or \"option A/B\".".to_string(),
        "7) Option texts must be meaningful and clearly distinguishable.".to_string(),
        format!("Example element: {EXAMPLE_ELEMENT}"),
    ];
    if request
        .question_types
        .iter()
        .any(|t| !t.is_choice())
    {
        lines.push(format!("Open question example: {OPEN_EXAMPLE_ELEMENT}"));
    }
    lines.join("\n")
}
