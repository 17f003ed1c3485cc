//! Shapes returned by the lifecycle manager's read operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    AttemptStatus, Difficulty, Feedback, Question, QuestionType, TestAttempt, TestStatus,
};
use crate::traits::TestBundle;

const MIN_TIME_LIMIT_SEC: u32 = 600;
const SECONDS_PER_QUESTION: u32 = 120;

/// Time allowed for a test of `question_count` questions.
pub fn time_limit_sec(question_count: u32) -> u32 {
    question_count
        .saturating_mul(SECONDS_PER_QUESTION)
        .max(MIN_TIME_LIMIT_SEC)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutcome {
    pub test_id: Uuid,
    pub status: TestStatus,
    /// Generation is synchronous, so this is always 0.
    pub eta_sec: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub id: Uuid,
    pub code: String,
    pub text: String,
}

/// A question with its answer key redacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub stem: String,
    pub topic_code: String,
    pub difficulty: Difficulty,
    pub options: Vec<OptionView>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            kind: question.kind,
            stem: question.stem.clone(),
            topic_code: question.topic_code.clone(),
            difficulty: question.difficulty,
            options: question
                .options
                .iter()
                .map(|o| OptionView {
                    id: o.id,
                    code: o.code.clone(),
                    text: o.text.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestView {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub difficulty: Difficulty,
    pub status: TestStatus,
    pub language: String,
    pub question_count: u32,
    pub time_limit_sec: u32,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<QuestionView>,
}

impl From<&TestBundle> for TestView {
    fn from(bundle: &TestBundle) -> Self {
        let test = &bundle.test;
        Self {
            id: test.id,
            subject_id: test.subject_id,
            subject_name: bundle.subject.name.clone(),
            difficulty: test.difficulty,
            status: test.status,
            language: test.language.clone(),
            question_count: test.question_count,
            time_limit_sec: time_limit_sec(test.question_count),
            created_at: test.created_at,
            questions: bundle.questions.iter().map(QuestionView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub score_percent: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionScore {
    pub question_id: Uuid,
    pub is_correct: bool,
    pub score_points: f64,
    pub max_points: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub score_points: f64,
    pub score_percent: f64,
    pub passed: bool,
    pub checked_at: Option<DateTime<Utc>>,
    pub breakdown: Vec<QuestionScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub attempt_id: Uuid,
    pub test_id: Uuid,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub difficulty: Difficulty,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score_percent: Option<f64>,
    pub passed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub items: Vec<AttemptSummary>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

/// One answer with its grade and the question it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDetail {
    pub question_id: Uuid,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub stem: String,
    pub topic_code: String,
    pub selected_option_ids: Vec<String>,
    pub answer_text: Option<String>,
    pub is_correct: Option<bool>,
    pub score_points: Option<f64>,
    pub max_points: f64,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDetails {
    pub attempt: TestAttempt,
    pub subject_name: String,
    pub answers: Vec<AnswerDetail>,
    pub feedback: Option<Feedback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_limit_has_floor() {
        assert_eq!(time_limit_sec(3), 600);
        assert_eq!(time_limit_sec(5), 600);
        assert_eq!(time_limit_sec(10), 1200);
    }
}
