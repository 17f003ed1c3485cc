//! Deterministic grading.
//!
//! Choice questions need an exact set match; open questions are scored by
//! the share of expected keywords found in the answer. No randomness and no
//! clock: identical input always yields identical output.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::locale::Locale;
use crate::model::{QuestionType, TopicMistakes};

/// Percent at or above which an attempt passes.
pub const PASS_THRESHOLD: f64 = 60.0;

/// Share of max points at or above which an open answer counts as correct.
pub const OPEN_CORRECT_RATIO: f64 = 0.6;

/// Answers without keywords must be longer than this to earn credit.
const KEYWORDLESS_MIN_CHARS: usize = 8;

/// One (question definition, submitted answer) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeItem {
    pub question_id: Uuid,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub topic_code: String,
    pub max_points: f64,
    #[serde(default)]
    pub correct_option_codes: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Submitted selections, already resolved to option codes.
    #[serde(default)]
    pub selected_codes: Vec<String>,
    #[serde(default)]
    pub answer_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rationale {
    Correct,
    WrongSelection,
    CoversCriteria,
    MissingKeyTerms,
}

impl Rationale {
    pub fn text(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Rationale::Correct, Locale::Ru) => "Верно.",
            (Rationale::Correct, Locale::En) => "Correct.",
            (Rationale::WrongSelection, Locale::Ru) => "Неверный набор вариантов ответа.",
            (Rationale::WrongSelection, Locale::En) => "Incorrect set of options.",
            (Rationale::CoversCriteria, Locale::Ru) => "Ответ покрывает основные критерии.",
            (Rationale::CoversCriteria, Locale::En) => "The answer covers the main criteria.",
            (Rationale::MissingKeyTerms, Locale::Ru) => {
                "Ответ неполный: не хватает ключевых терминов по теме."
            }
            (Rationale::MissingKeyTerms, Locale::En) => {
                "The answer is incomplete: key terms for the topic are missing."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    pub question_id: Uuid,
    pub is_correct: bool,
    pub score_points: f64,
    pub max_points: f64,
    pub rationale: Rationale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
    pub outcomes: Vec<QuestionOutcome>,
    pub total_points: f64,
    pub max_points: f64,
    pub percent: f64,
    pub passed: bool,
    /// Mistake counts per topic, in first-seen order.
    pub mistakes: Vec<TopicMistakes>,
}

impl GradeReport {
    /// Mistakes ordered by descending count; ties keep first-seen order.
    pub fn mistakes_by_frequency(&self) -> Vec<TopicMistakes> {
        let mut sorted = self.mistakes.clone();
        sorted.sort_by(|a, b| b.count.cmp(&a.count));
        sorted
    }
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Lowercase, replace anything but letters and digits with spaces, collapse.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Exact set equality of sorted codes; no partial credit.
pub fn choice_is_correct(selected: &[String], correct: &[String]) -> bool {
    let mut selected: Vec<String> = selected.iter().map(|c| c.trim().to_uppercase()).collect();
    let mut correct: Vec<String> = correct.iter().map(|c| c.trim().to_uppercase()).collect();
    selected.sort();
    selected.dedup();
    correct.sort();
    correct.dedup();
    selected == correct
}

/// Share of keywords present in the answer, or a length heuristic when the
/// question defines none.
pub fn keyword_ratio(answer_text: &str, keywords: &[String]) -> f64 {
    let answer = normalize_text(answer_text);
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| normalize_text(k))
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        return if answer.chars().count() > KEYWORDLESS_MIN_CHARS {
            1.0
        } else {
            0.0
        };
    }
    let matched = keywords.iter().filter(|k| answer.contains(k.as_str())).count();
    matched as f64 / keywords.len() as f64
}

fn grade_item(item: &GradeItem) -> QuestionOutcome {
    let (is_correct, score_points, rationale) = if item.kind.is_choice() {
        if choice_is_correct(&item.selected_codes, &item.correct_option_codes) {
            (true, item.max_points, Rationale::Correct)
        } else {
            (false, 0.0, Rationale::WrongSelection)
        }
    } else {
        let ratio = keyword_ratio(&item.answer_text, &item.keywords);
        let points = round2(item.max_points * ratio.min(1.0));
        if points >= item.max_points * OPEN_CORRECT_RATIO {
            (true, points, Rationale::CoversCriteria)
        } else {
            (false, points, Rationale::MissingKeyTerms)
        }
    };
    QuestionOutcome {
        question_id: item.question_id,
        is_correct,
        score_points,
        max_points: item.max_points,
        rationale,
    }
}

/// Grade a set of answers.
pub fn grade(items: &[GradeItem]) -> GradeReport {
    let outcomes: Vec<QuestionOutcome> = items.iter().map(grade_item).collect();

    let mut mistakes: Vec<TopicMistakes> = Vec::new();
    for (item, outcome) in items.iter().zip(&outcomes) {
        if outcome.is_correct {
            continue;
        }
        match mistakes.iter_mut().find(|m| m.topic_code == item.topic_code) {
            Some(entry) => entry.count += 1,
            None => mistakes.push(TopicMistakes {
                topic_code: item.topic_code.clone(),
                count: 1,
            }),
        }
    }

    let max_points: f64 = outcomes.iter().map(|o| o.max_points).sum();
    let total_points: f64 = outcomes.iter().map(|o| o.score_points).sum();
    let percent = if max_points > 0.0 {
        round2(100.0 * total_points / max_points)
    } else {
        0.0
    };

    GradeReport {
        outcomes,
        total_points: round2(total_points),
        max_points: round2(max_points),
        percent,
        passed: percent >= PASS_THRESHOLD,
        mistakes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn choice(topic: &str, correct: &[&str], selected: &[&str]) -> GradeItem {
        GradeItem {
            question_id: Uuid::new_v4(),
            kind: QuestionType::SingleChoice,
            topic_code: topic.into(),
            max_points: 1.0,
            correct_option_codes: codes(correct),
            keywords: Vec::new(),
            selected_codes: codes(selected),
            answer_text: String::new(),
        }
    }

    fn open(topic: &str, max_points: f64, keywords: &[&str], answer: &str) -> GradeItem {
        GradeItem {
            question_id: Uuid::new_v4(),
            kind: QuestionType::OpenShort,
            topic_code: topic.into(),
            max_points,
            correct_option_codes: Vec::new(),
            keywords: codes(keywords),
            selected_codes: Vec::new(),
            answer_text: answer.into(),
        }
    }

    #[test]
    fn multi_choice_requires_exact_set() {
        let correct = codes(&["A", "B"]);
        assert!(!choice_is_correct(&codes(&["A"]), &correct));
        assert!(choice_is_correct(&codes(&["B", "A"]), &correct));
        assert!(!choice_is_correct(&codes(&["A", "B", "C"]), &correct));
        assert!(!choice_is_correct(&[], &correct));
    }

    #[test]
    fn open_answer_matches_keywords_regardless_of_case_and_punctuation() {
        let item = open("циклы", 5.0, &["цикл", "условие"], "ЦИКЛ выполняется, пока УСЛОВИЕ истинно!");
        let report = grade(&[item]);
        assert_eq!(report.outcomes[0].score_points, 5.0);
        assert!(report.outcomes[0].is_correct);
        assert_eq!(report.outcomes[0].rationale, Rationale::CoversCriteria);
    }

    #[test]
    fn open_answer_without_keywords_uses_length() {
        assert_eq!(keyword_ratio("short", &[]), 0.0);
        assert_eq!(keyword_ratio("a sufficiently long answer", &[]), 1.0);
        assert_eq!(keyword_ratio("!!! ... !!!", &[]), 0.0);
    }

    #[test]
    fn mixed_attempt_scores_fifty_percent() {
        let items = vec![
            choice("kinematics", &["A"], &["A"]),
            choice("kinematics", &["B"], &["C"]),
            open("energy", 4.0, &["energy", "work"], "energy is conserved"),
        ];
        let report = grade(&items);
        assert_eq!(report.max_points, 6.0);
        assert_eq!(report.total_points, 3.0);
        assert_eq!(report.percent, 50.0);
        assert!(!report.passed);
        assert_eq!(report.outcomes[2].score_points, 2.0);
        assert!(!report.outcomes[2].is_correct);
        assert_eq!(
            report.mistakes,
            vec![
                TopicMistakes {
                    topic_code: "kinematics".into(),
                    count: 1
                },
                TopicMistakes {
                    topic_code: "energy".into(),
                    count: 1
                }
            ]
        );
    }

    #[test]
    fn mistakes_accumulate_per_topic_and_sort_by_frequency() {
        let items = vec![
            choice("a", &["A"], &["B"]),
            choice("b", &["A"], &["B"]),
            choice("b", &["A"], &["C"]),
            choice("c", &["A"], &["A"]),
        ];
        let report = grade(&items);
        let sorted = report.mistakes_by_frequency();
        assert_eq!(sorted[0].topic_code, "b");
        assert_eq!(sorted[0].count, 2);
        assert_eq!(sorted[1].topic_code, "a");
        assert_eq!(report.percent, 25.0);
    }

    #[test]
    fn empty_input_scores_zero() {
        let report = grade(&[]);
        assert_eq!(report.percent, 0.0);
        assert!(!report.passed);
    }

    #[test]
    fn grading_is_deterministic() {
        let items = vec![
            choice("a", &["A", "C"], &["C", "A"]),
            open("b", 5.0, &["one", "two", "three"], "one and three"),
        ];
        assert_eq!(grade(&items), grade(&items));
        assert_eq!(grade(&items).outcomes[1].score_points, 3.33);
    }

    #[test]
    fn rationale_is_localized() {
        assert_eq!(Rationale::Correct.text(Locale::Ru), "Верно.");
        assert_eq!(Rationale::WrongSelection.text(Locale::En), "Incorrect set of options.");
    }
}
