//! Core data model types for quizforge.
//!
//! These are the records the pipeline produces, the repository persists and
//! the lifecycle manager moves through their state machines.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Points awarded for a correctly answered choice question.
pub const CHOICE_MAX_POINTS: f64 = 1.0;

/// Max points of an open question whose rubric does not sum to a positive value.
pub const DEFAULT_OPEN_MAX_POINTS: f64 = 5.0;

/// Requested difficulty of a test and its questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "EASY"),
            Difficulty::Medium => write!(f, "MEDIUM"),
            Difficulty::Hard => write!(f, "HARD"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EASY" => Ok(Difficulty::Easy),
            "MEDIUM" => Ok(Difficulty::Medium),
            "HARD" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// The three gradable question kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    MultiChoice,
    OpenShort,
}

impl QuestionType {
    /// Returns `true` for option-based question kinds.
    pub fn is_choice(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultiChoice)
    }

    /// Map one of the many spellings a provider may use onto a canonical type.
    ///
    /// Accepts e.g. `single`, `Single-Choice`, `multiple choice`, `short_answer`.
    pub fn from_loose(value: &str) -> Option<Self> {
        let normalized = value
            .trim()
            .to_uppercase()
            .split(|c: char| c.is_whitespace() || c == '-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        match normalized.as_str() {
            "SINGLE" | "SINGLE_CHOICE" | "SINGLE_SELECT" => Some(QuestionType::SingleChoice),
            "MULTI" | "MULTI_CHOICE" | "MULTIPLE_CHOICE" => Some(QuestionType::MultiChoice),
            "OPEN" | "OPEN_SHORT" | "SHORT_ANSWER" => Some(QuestionType::OpenShort),
            _ => None,
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::SingleChoice => write!(f, "SINGLE_CHOICE"),
            QuestionType::MultiChoice => write!(f, "MULTI_CHOICE"),
            QuestionType::OpenShort => write!(f, "OPEN_SHORT"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuestionType::from_loose(s).ok_or_else(|| format!("unknown question type: {}", s.trim()))
    }
}

/// Test lifecycle: `GENERATING -> READY`, or `GENERATING -> FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Generating,
    Ready,
    Failed,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Generating => write!(f, "GENERATING"),
            TestStatus::Ready => write!(f, "READY"),
            TestStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Attempt lifecycle: `IN_PROGRESS -> CHECKING -> COMPLETED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Checking,
    Completed,
}

impl AttemptStatus {
    /// Non-terminal attempts are reused by later submissions.
    pub fn is_open(self) -> bool {
        !matches!(self, AttemptStatus::Completed)
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_transition_to(self, next: AttemptStatus) -> bool {
        matches!(
            (self, next),
            (AttemptStatus::InProgress, AttemptStatus::Checking)
                | (AttemptStatus::Checking, AttemptStatus::Checking)
                | (AttemptStatus::Checking, AttemptStatus::Completed)
        )
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::InProgress => write!(f, "IN_PROGRESS"),
            AttemptStatus::Checking => write!(f, "CHECKING"),
            AttemptStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Direction of a weekly progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Up,
    Down,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "UP"),
            Trend::Down => write!(f, "DOWN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    Practice,
}

/// A teachable unit. Created on first reference, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: Uuid,
    /// Code assigned by an upstream system (e.g. a schedule feed). Unique.
    #[serde(default)]
    pub external_code: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Opaque structured outline; topics may be inferred from it.
    #[serde(default)]
    pub syllabus: Option<serde_json::Value>,
}

/// The output of one generation request, owned by the requesting student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub difficulty: Difficulty,
    pub question_count: u32,
    pub language: String,
    pub status: TestStatus,
    pub created_at: DateTime<Utc>,
}

/// One scoring criterion of an open question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricCriterion {
    pub criterion: String,
    #[serde(alias = "max_points", alias = "points")]
    pub max_points: f64,
}

/// An answer option before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDraft {
    pub code: String,
    pub text: String,
    pub is_correct: bool,
}

/// A validated question ready for persistence, produced by the generation
/// pipeline whether it came from a provider or from the fallback generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalQuestion {
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub stem: String,
    pub topic_code: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub options: Vec<OptionDraft>,
    #[serde(default)]
    pub correct_option_codes: Vec<String>,
    #[serde(default)]
    pub expected_answer: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub rubric: Option<Vec<RubricCriterion>>,
    pub fingerprint: String,
}

impl CanonicalQuestion {
    pub fn max_points(&self) -> f64 {
        max_points(self.kind, self.rubric.as_deref())
    }
}

/// Max points for a question of `kind` with an optional rubric.
pub fn max_points(kind: QuestionType, rubric: Option<&[RubricCriterion]>) -> f64 {
    if kind.is_choice() {
        return CHOICE_MAX_POINTS;
    }
    let sum: f64 = rubric
        .unwrap_or_default()
        .iter()
        .map(|c| c.max_points)
        .sum();
    if sum > 0.0 {
        sum
    } else {
        DEFAULT_OPEN_MAX_POINTS
    }
}

/// A persisted answer option of a choice question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: Uuid,
    pub code: String,
    pub text: String,
    pub is_correct: bool,
}

/// What counts as a correct answer to a question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectAnswer {
    #[serde(default)]
    pub option_codes: Vec<String>,
    #[serde(default)]
    pub expected_answer: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A persisted question. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub test_id: Uuid,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub stem: String,
    pub topic_code: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    #[serde(default)]
    pub correct: CorrectAnswer,
    #[serde(default)]
    pub rubric: Option<Vec<RubricCriterion>>,
    pub fingerprint: String,
}

impl Question {
    /// Build the persisted form of a canonical question, assigning fresh ids.
    pub fn from_canonical(test_id: Uuid, question: &CanonicalQuestion) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_id,
            kind: question.kind,
            stem: question.stem.clone(),
            topic_code: question.topic_code.clone(),
            difficulty: question.difficulty,
            options: question
                .options
                .iter()
                .map(|o| AnswerOption {
                    id: Uuid::new_v4(),
                    code: o.code.clone(),
                    text: o.text.clone(),
                    is_correct: o.is_correct,
                })
                .collect(),
            correct: CorrectAnswer {
                option_codes: question.correct_option_codes.clone(),
                expected_answer: question.expected_answer.clone(),
                keywords: question.keywords.clone(),
            },
            rubric: question.rubric.clone(),
            fingerprint: question.fingerprint.clone(),
        }
    }

    pub fn max_points(&self) -> f64 {
        max_points(self.kind, self.rubric.as_deref())
    }

    /// Correct option codes, falling back to the options' correctness flags.
    pub fn correct_option_codes(&self) -> Vec<String> {
        if !self.correct.option_codes.is_empty() {
            return self.correct.option_codes.clone();
        }
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.code.clone())
            .collect()
    }

    /// The option a selection refers to, by option id or by code.
    pub fn find_option(&self, selection: &str) -> Option<&AnswerOption> {
        let selection = selection.trim();
        self.options
            .iter()
            .find(|o| o.id.to_string() == selection || o.code.eq_ignore_ascii_case(selection))
    }

    /// Resolve submitted selections to an ordered set of option ids.
    ///
    /// Unknown selections and repeats are dropped; order follows the submission.
    pub fn resolve_selection(&self, selected: &[String]) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for option in selected.iter().filter_map(|sel| self.find_option(sel)) {
            let id = option.id.to_string();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Resolve submitted selections (option ids or codes) to option codes.
    ///
    /// Unknown selections are dropped; order follows the submission.
    pub fn selected_codes(&self, selected: &[String]) -> Vec<String> {
        selected
            .iter()
            .filter_map(|sel| self.find_option(sel))
            .map(|o| o.code.clone())
            .collect()
    }
}

/// One student's pass at a test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAttempt {
    pub id: Uuid,
    pub test_id: Uuid,
    pub student_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client_duration_sec: Option<u32>,
    #[serde(default)]
    pub score_points: Option<f64>,
    #[serde(default)]
    pub score_percent: Option<f64>,
    #[serde(default)]
    pub passed: Option<bool>,
}

impl TestAttempt {
    pub fn open(test_id: Uuid, student_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_id,
            student_id,
            status: AttemptStatus::InProgress,
            started_at: now,
            submitted_at: None,
            checked_at: None,
            client_duration_sec: None,
            score_points: None,
            score_percent: None,
            passed: None,
        }
    }
}

/// A student's answer to one question within one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAnswer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    /// Ordered set of selected option ids (or codes).
    #[serde(default)]
    pub selected_option_ids: Vec<String>,
    #[serde(default)]
    pub answer_text: Option<String>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub score_points: Option<f64>,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// A search link pointing at reference material for a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialLink {
    pub title: String,
    pub url: String,
    pub source: String,
}

/// Explanation of the mistakes made on one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeExplanation {
    pub topic_code: String,
    pub count: u32,
    pub why: String,
    pub fix: String,
    #[serde(default)]
    pub materials: Vec<MaterialLink>,
}

/// One per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub attempt_id: Uuid,
    pub summary: String,
    pub passed: bool,
    /// Ordered by descending mistake count.
    #[serde(default)]
    pub mistakes: Vec<MistakeExplanation>,
}

/// A priority-ordered practice suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub student_id: Uuid,
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    /// 1 is the most important.
    pub priority: u32,
    pub topic_code: String,
    pub text: String,
    #[serde(default)]
    pub materials: Vec<MaterialLink>,
}

/// Longitudinal weakness indicator keyed by (student, subject, topic).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakTopic {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub topic_code: String,
    pub weakness_score: f64,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeTask {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub topic_code: String,
    pub prompt: String,
    pub expected_format: String,
}

/// Mistake count for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMistakes {
    pub topic_code: String,
    pub count: u32,
}

/// Weekly rolling performance summary, keyed by (student, subject, week start).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    /// Monday of the ISO week, UTC.
    pub week_start: NaiveDate,
    pub avg_score: f64,
    pub trend: Trend,
    /// Mistakes of the attempt that triggered the latest recompute.
    #[serde(default)]
    pub mistakes_by_topic: Vec<TopicMistakes>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_loose_spellings() {
        assert_eq!(QuestionType::from_loose("single"), Some(QuestionType::SingleChoice));
        assert_eq!(
            QuestionType::from_loose(" Single-Select "),
            Some(QuestionType::SingleChoice)
        );
        assert_eq!(
            QuestionType::from_loose("multiple choice"),
            Some(QuestionType::MultiChoice)
        );
        assert_eq!(QuestionType::from_loose("MULTI"), Some(QuestionType::MultiChoice));
        assert_eq!(
            QuestionType::from_loose("short_answer"),
            Some(QuestionType::OpenShort)
        );
        assert_eq!(QuestionType::from_loose("open"), Some(QuestionType::OpenShort));
        assert_eq!(QuestionType::from_loose("essay"), None);
        assert_eq!(QuestionType::from_loose(""), None);
    }

    #[test]
    fn difficulty_display_and_parse() {
        assert_eq!(Difficulty::Medium.to_string(), "MEDIUM");
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn serde_uses_screaming_case() {
        let json = serde_json::to_string(&QuestionType::OpenShort).unwrap();
        assert_eq!(json, "\"OPEN_SHORT\"");
        let status: AttemptStatus = serde_json::from_str("\"IN_PROGRESS\"").unwrap();
        assert_eq!(status, AttemptStatus::InProgress);
    }

    #[test]
    fn attempt_transitions_only_move_forward() {
        assert!(AttemptStatus::InProgress.can_transition_to(AttemptStatus::Checking));
        assert!(AttemptStatus::Checking.can_transition_to(AttemptStatus::Completed));
        assert!(!AttemptStatus::Completed.can_transition_to(AttemptStatus::InProgress));
        assert!(!AttemptStatus::InProgress.can_transition_to(AttemptStatus::Completed));
        assert!(AttemptStatus::Checking.is_open());
        assert!(!AttemptStatus::Completed.is_open());
    }

    #[test]
    fn max_points_by_kind() {
        assert_eq!(max_points(QuestionType::SingleChoice, None), 1.0);
        let rubric = vec![
            RubricCriterion {
                criterion: "a".into(),
                max_points: 3.0,
            },
            RubricCriterion {
                criterion: "b".into(),
                max_points: 1.0,
            },
        ];
        assert_eq!(max_points(QuestionType::OpenShort, Some(&rubric)), 4.0);
        assert_eq!(max_points(QuestionType::OpenShort, Some(&[])), 5.0);
        assert_eq!(max_points(QuestionType::OpenShort, None), 5.0);
    }

    #[test]
    fn selected_codes_match_ids_and_codes() {
        let option_a = AnswerOption {
            id: Uuid::new_v4(),
            code: "A".into(),
            text: "first".into(),
            is_correct: true,
        };
        let option_b = AnswerOption {
            id: Uuid::new_v4(),
            code: "B".into(),
            text: "second".into(),
            is_correct: false,
        };
        let question = Question {
            id: Uuid::new_v4(),
            test_id: Uuid::new_v4(),
            kind: QuestionType::MultiChoice,
            stem: "?".into(),
            topic_code: "t".into(),
            difficulty: Difficulty::Easy,
            options: vec![option_a.clone(), option_b],
            correct: CorrectAnswer::default(),
            rubric: None,
            fingerprint: String::new(),
        };
        let selected = vec!["b".to_string(), option_a.id.to_string(), "Z".to_string()];
        assert_eq!(question.selected_codes(&selected), vec!["B", "A"]);
        let repeated = vec!["a".to_string(), option_a.id.to_string(), "nope".to_string()];
        assert_eq!(question.resolve_selection(&repeated), vec![option_a.id.to_string()]);
        assert_eq!(question.correct_option_codes(), vec!["A"]);
    }
}
