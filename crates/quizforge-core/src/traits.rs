//! Async trait seams.
//!
//! `LlmProvider` is implemented by `quizforge-providers`, `Repository` by
//! `quizforge-store`. `QuestionSource` has two implementations in this crate:
//! the remote source wrapping a provider chain and the deterministic fallback.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::locale::Locale;
use crate::model::{
    CanonicalQuestion, Difficulty, Feedback, PracticeTask, ProgressSnapshot,
    Question, QuestionType, Recommendation, StudentAnswer, Subject, Test, TestAttempt,
    TopicMistakes, WeakTopic,
};

// ---------------------------------------------------------------------------
// LLM Provider trait
// ---------------------------------------------------------------------------

/// A text-generation endpoint.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable endpoint name (e.g. "gemini/v1").
    fn name(&self) -> &str;

    /// Issue one generation request.
    ///
    /// Failures should be `ProviderError` values wrapped in `anyhow` so callers
    /// can downcast them.
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The full instruction-plus-schema prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// First non-empty candidate text.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

// ---------------------------------------------------------------------------
// Question sources
// ---------------------------------------------------------------------------

/// Everything a source needs to produce questions for one test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRequest {
    pub subject_name: String,
    pub subject_description: Option<String>,
    pub language: String,
    pub difficulty: Difficulty,
    pub question_count: u32,
    pub question_types: Vec<QuestionType>,
    /// Resolved topic list, never empty once it reaches a source.
    pub topics: Vec<String>,
}

impl SourceRequest {
    pub fn locale(&self) -> Locale {
        Locale::from_tag(&self.language)
    }
}

/// One link in the generation chain.
///
/// `None` (or an empty list) means "no usable result, try the next source".
/// Sources never fail loudly.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    fn name(&self) -> &str;

    async fn produce(&self, request: &SourceRequest) -> Option<Vec<CanonicalQuestion>>;
}

// ---------------------------------------------------------------------------
// Repository trait
// ---------------------------------------------------------------------------

/// A test with its subject and questions.
#[derive(Debug, Clone)]
pub struct TestBundle {
    pub test: Test,
    pub subject: Subject,
    pub questions: Vec<Question>,
}

/// An attempt with everything recorded against it.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt: TestAttempt,
    pub test: Test,
    pub subject: Subject,
    pub questions: Vec<Question>,
    pub answers: Vec<StudentAnswer>,
    pub feedback: Option<Feedback>,
    pub recommendations: Vec<Recommendation>,
}

/// One answer to upsert, already resolved against its question.
#[derive(Debug, Clone)]
pub struct AnswerDraft {
    pub question_id: Uuid,
    pub selected_option_ids: Vec<String>,
    pub answer_text: Option<String>,
}

/// Answers recorded in one atomic step, moving the attempt to `CHECKING`.
#[derive(Debug, Clone)]
pub struct Submission {
    pub attempt_id: Uuid,
    pub answers: Vec<AnswerDraft>,
    pub submitted_at: DateTime<Utc>,
    pub client_duration_sec: Option<u32>,
}

/// Grade of one stored answer.
#[derive(Debug, Clone)]
pub struct AnswerGrade {
    pub question_id: Uuid,
    pub is_correct: bool,
    pub score_points: f64,
    pub rationale: String,
}

/// Everything written when an attempt is graded, applied atomically.
#[derive(Debug, Clone)]
pub struct GradingCommit {
    pub attempt_id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub checked_at: DateTime<Utc>,
    pub grades: Vec<AnswerGrade>,
    pub score_points: f64,
    pub score_percent: f64,
    pub passed: bool,
    pub feedback: Feedback,
    pub recommendations: Vec<Recommendation>,
    /// Topics to touch in the weak-topic table, one entry per mistaken topic.
    pub weak_topics: Vec<String>,
    pub practice_tasks: Vec<PracticeTask>,
    /// Mistakes of this attempt, stored on the recomputed snapshot.
    pub mistakes_by_topic: Vec<TopicMistakes>,
}

/// Attempt listing filter.
#[derive(Debug, Clone)]
pub struct AttemptFilter {
    pub student_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub offset: usize,
    pub limit: usize,
}

/// One row of an attempt listing.
#[derive(Debug, Clone)]
pub struct AttemptListing {
    pub attempt: TestAttempt,
    pub test: Test,
    pub subject: Subject,
}

/// Storage collaborator.
///
/// Every method is one atomic unit: either all of its writes become visible
/// or none do.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_subject(&self, id_or_code: &str) -> Result<Option<Subject>, StoreError>;

    /// Find a subject by id or external code, creating it when unknown.
    async fn ensure_subject(&self, id_or_code: &str) -> Result<Subject, StoreError>;

    async fn create_test(&self, test: Test) -> Result<Test, StoreError>;

    /// Insert all questions and options, then flip the test to `READY`.
    async fn persist_questions(
        &self,
        test_id: Uuid,
        questions: Vec<Question>,
    ) -> Result<(), StoreError>;

    async fn mark_test_failed(&self, test_id: Uuid) -> Result<(), StoreError>;

    /// A test owned by `student_id`, with subject and questions.
    async fn find_test(
        &self,
        test_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<TestBundle>, StoreError>;

    /// Return the open attempt for (test, student), creating one if none exists.
    async fn find_or_open_attempt(
        &self,
        test_id: Uuid,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TestAttempt, StoreError>;

    /// Upsert answers by (attempt, question) and move the attempt to `CHECKING`.
    ///
    /// Returns every answer stored on the attempt afterwards.
    async fn record_submission(
        &self,
        submission: Submission,
    ) -> Result<Vec<StudentAnswer>, StoreError>;

    /// Store grades, complete the attempt, write derived analytics and
    /// recompute the weekly snapshot.
    async fn commit_grading(&self, commit: GradingCommit) -> Result<ProgressSnapshot, StoreError>;

    /// An attempt owned by `student_id`, with everything recorded against it.
    async fn find_attempt(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<AttemptRecord>, StoreError>;

    /// Attempts ordered by submission time, newest first, plus the total count.
    async fn list_attempts(
        &self,
        filter: AttemptFilter,
    ) -> Result<(Vec<AttemptListing>, usize), StoreError>;

    async fn weak_topics(
        &self,
        student_id: Uuid,
        subject_id: Option<Uuid>,
    ) -> Result<Vec<WeakTopic>, StoreError>;

    async fn progress_snapshots(
        &self,
        student_id: Uuid,
        subject_id: Option<Uuid>,
    ) -> Result<Vec<ProgressSnapshot>, StoreError>;
}
