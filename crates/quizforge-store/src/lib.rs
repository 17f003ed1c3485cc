//! quizforge-store: in-memory `Repository` with JSON snapshots.
//!
//! All state sits behind one async mutex; every repository method takes the
//! lock once, validates, then applies its writes, so each call is atomic.
//! The whole state can be saved to and loaded from a JSON file, which is how
//! the CLI persists between invocations.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use quizforge_core::analytics::{progress_snapshot, touch_weak_topic, week_start, SNAPSHOT_WINDOW};
use quizforge_core::error::StoreError;
use quizforge_core::model::{
    AttemptStatus, Feedback, PracticeTask, ProgressSnapshot, Question, Recommendation,
    StudentAnswer, Subject, Test, TestAttempt, TestStatus, WeakTopic,
};
use quizforge_core::traits::{
    AttemptFilter, AttemptListing, AttemptRecord, GradingCommit, Repository, Submission,
    TestBundle,
};

const AUTO_SUBJECT_DESCRIPTION: &str = "Auto-created subject from external schedule code";

/// Serializable store contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub tests: HashMap<Uuid, Test>,
    /// Questions keyed by test id, in generation order.
    #[serde(default)]
    pub questions: HashMap<Uuid, Vec<Question>>,
    #[serde(default)]
    pub attempts: HashMap<Uuid, TestAttempt>,
    #[serde(default)]
    pub answers: Vec<StudentAnswer>,
    /// Feedback keyed by attempt id.
    #[serde(default)]
    pub feedback: HashMap<Uuid, Feedback>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub weak_topics: Vec<WeakTopic>,
    #[serde(default)]
    pub practice_tasks: Vec<PracticeTask>,
    #[serde(default)]
    pub snapshots: Vec<ProgressSnapshot>,
}

impl StoreState {
    fn subject_by_ref(&self, id_or_code: &str) -> Option<&Subject> {
        let reference = id_or_code.trim();
        let by_id = Uuid::parse_str(reference)
            .ok()
            .and_then(|id| self.subjects.iter().find(|s| s.id == id));
        by_id.or_else(|| {
            self.subjects
                .iter()
                .find(|s| s.external_code.as_deref() == Some(reference))
        })
    }

    fn subject(&self, id: Uuid) -> Result<&Subject, StoreError> {
        self.subjects
            .iter()
            .find(|s| s.id == id)
            .ok_or(StoreError::MissingRecord {
                entity: "subject",
                id,
            })
    }

    fn test(&self, id: Uuid) -> Result<&Test, StoreError> {
        self.tests.get(&id).ok_or(StoreError::MissingRecord { entity: "test", id })
    }

    fn attempt_mut(&mut self, id: Uuid) -> Result<&mut TestAttempt, StoreError> {
        self.attempts
            .get_mut(&id)
            .ok_or(StoreError::MissingRecord {
                entity: "attempt",
                id,
            })
    }

    fn questions_of(&self, test_id: Uuid) -> Vec<Question> {
        self.questions.get(&test_id).cloned().unwrap_or_default()
    }

    fn answers_of(&self, attempt_id: Uuid) -> Vec<StudentAnswer> {
        self.answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect()
    }

    fn subject_of_attempt(&self, attempt: &TestAttempt) -> Option<Uuid> {
        self.tests.get(&attempt.test_id).map(|t| t.subject_id)
    }

    /// Completed, scored attempts ordered newest submission first.
    fn completed_scores(&self, student_id: Uuid, subject_id: Uuid, limit: usize) -> Vec<f64> {
        let mut completed: Vec<&TestAttempt> = self
            .attempts
            .values()
            .filter(|a| {
                a.student_id == student_id
                    && a.status == AttemptStatus::Completed
                    && a.score_percent.is_some()
                    && self.subject_of_attempt(a) == Some(subject_id)
            })
            .collect();
        completed.sort_by(|a, b| newest_first(a, b));
        completed
            .into_iter()
            .take(limit)
            .filter_map(|a| a.score_percent)
            .collect()
    }
}

/// Submitted attempts newest first, unsubmitted ones last by start time.
fn newest_first(a: &TestAttempt, b: &TestAttempt) -> std::cmp::Ordering {
    match (a.submitted_at, b.submitted_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.started_at.cmp(&a.started_at),
    }
}

/// In-memory repository.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// A copy of the current contents.
    pub async fn snapshot(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    /// Register a subject up front, e.g. one with a syllabus.
    pub async fn insert_subject(&self, subject: Subject) {
        let mut state = self.state.lock().await;
        state.subjects.retain(|s| s.id != subject.id);
        state.subjects.push(subject);
    }

    /// Save the store contents as JSON to a file.
    pub async fn save_json(&self, path: &Path) -> Result<()> {
        let state = self.state.lock().await;
        let json = serde_json::to_string_pretty(&*state).context("failed to serialize store")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write store to {}", path.display()))?;
        Ok(())
    }

    /// Load a store from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read store from {}", path.display()))?;
        let state: StoreState =
            serde_json::from_str(&content).context("failed to parse store JSON")?;
        Ok(Self::from_state(state))
    }

    /// Load the store at `path`, or start empty if the file does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_json(path)
        } else {
            Ok(Self::new())
        }
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn find_subject(&self, id_or_code: &str) -> Result<Option<Subject>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.subject_by_ref(id_or_code).cloned())
    }

    async fn ensure_subject(&self, id_or_code: &str) -> Result<Subject, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(subject) = state.subject_by_ref(id_or_code) {
            return Ok(subject.clone());
        }
        let reference = id_or_code.trim().to_string();
        let subject = Subject {
            id: Uuid::new_v4(),
            external_code: Some(reference.clone()),
            name: reference,
            description: Some(AUTO_SUBJECT_DESCRIPTION.to_string()),
            syllabus: None,
        };
        debug!(subject_id = %subject.id, code = ?subject.external_code, "subject created");
        state.subjects.push(subject.clone());
        Ok(subject)
    }

    async fn create_test(&self, test: Test) -> Result<Test, StoreError> {
        let mut state = self.state.lock().await;
        state.subject(test.subject_id)?;
        state.tests.insert(test.id, test.clone());
        Ok(test)
    }

    async fn persist_questions(
        &self,
        test_id: Uuid,
        questions: Vec<Question>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let status = state.test(test_id)?.status;
        if status != TestStatus::Generating {
            return Err(StoreError::Backend(format!(
                "test {test_id} is {status}, questions can only be added while GENERATING"
            )));
        }
        if let Some(foreign) = questions.iter().find(|q| q.test_id != test_id) {
            return Err(StoreError::Backend(format!(
                "question {} belongs to test {}",
                foreign.id, foreign.test_id
            )));
        }
        state.questions.insert(test_id, questions);
        if let Some(test) = state.tests.get_mut(&test_id) {
            test.status = TestStatus::Ready;
        }
        Ok(())
    }

    async fn mark_test_failed(&self, test_id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let test = state
            .tests
            .get_mut(&test_id)
            .ok_or(StoreError::MissingRecord {
                entity: "test",
                id: test_id,
            })?;
        test.status = TestStatus::Failed;
        Ok(())
    }

    async fn find_test(
        &self,
        test_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<TestBundle>, StoreError> {
        let state = self.state.lock().await;
        let Some(test) = state.tests.get(&test_id).filter(|t| t.student_id == student_id) else {
            return Ok(None);
        };
        Ok(Some(TestBundle {
            test: test.clone(),
            subject: state.subject(test.subject_id)?.clone(),
            questions: state.questions_of(test_id),
        }))
    }

    async fn find_or_open_attempt(
        &self,
        test_id: Uuid,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TestAttempt, StoreError> {
        let mut state = self.state.lock().await;
        state.test(test_id)?;
        let open = state
            .attempts
            .values()
            .filter(|a| a.test_id == test_id && a.student_id == student_id && a.status.is_open())
            .max_by_key(|a| a.started_at);
        if let Some(attempt) = open {
            return Ok(attempt.clone());
        }
        let attempt = TestAttempt::open(test_id, student_id, now);
        debug!(attempt_id = %attempt.id, test_id = %test_id, "attempt opened");
        state.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn record_submission(
        &self,
        submission: Submission,
    ) -> Result<Vec<StudentAnswer>, StoreError> {
        let mut state = self.state.lock().await;
        let attempt = state.attempt_mut(submission.attempt_id)?;
        if !attempt.status.can_transition_to(AttemptStatus::Checking) {
            return Err(StoreError::InvalidTransition {
                id: attempt.id,
                from: attempt.status.to_string(),
                to: AttemptStatus::Checking.to_string(),
            });
        }
        attempt.status = AttemptStatus::Checking;
        attempt.submitted_at = Some(submission.submitted_at);
        attempt.client_duration_sec = submission.client_duration_sec;

        for draft in submission.answers {
            let existing = state.answers.iter_mut().find(|a| {
                a.attempt_id == submission.attempt_id && a.question_id == draft.question_id
            });
            match existing {
                Some(answer) => {
                    answer.selected_option_ids = draft.selected_option_ids;
                    answer.answer_text = draft.answer_text;
                }
                None => state.answers.push(StudentAnswer {
                    id: Uuid::new_v4(),
                    attempt_id: submission.attempt_id,
                    question_id: draft.question_id,
                    selected_option_ids: draft.selected_option_ids,
                    answer_text: draft.answer_text,
                    is_correct: None,
                    score_points: None,
                    rationale: None,
                }),
            }
        }

        Ok(state.answers_of(submission.attempt_id))
    }

    async fn commit_grading(&self, commit: GradingCommit) -> Result<ProgressSnapshot, StoreError> {
        let mut state = self.state.lock().await;

        // Validate before the first write.
        let attempt = state.attempt_mut(commit.attempt_id)?;
        if !attempt.status.can_transition_to(AttemptStatus::Completed) {
            return Err(StoreError::InvalidTransition {
                id: attempt.id,
                from: attempt.status.to_string(),
                to: AttemptStatus::Completed.to_string(),
            });
        }
        attempt.status = AttemptStatus::Completed;
        attempt.checked_at = Some(commit.checked_at);
        attempt.score_points = Some(commit.score_points);
        attempt.score_percent = Some(commit.score_percent);
        attempt.passed = Some(commit.passed);

        let grades: HashMap<Uuid, _> = commit.grades.iter().map(|g| (g.question_id, g)).collect();
        for answer in state
            .answers
            .iter_mut()
            .filter(|a| a.attempt_id == commit.attempt_id)
        {
            if let Some(grade) = grades.get(&answer.question_id) {
                answer.is_correct = Some(grade.is_correct);
                answer.score_points = Some(grade.score_points);
                answer.rationale = Some(grade.rationale.clone());
            }
        }

        state.feedback.insert(commit.attempt_id, commit.feedback);
        state.recommendations.extend(commit.recommendations);

        for topic in &commit.weak_topics {
            let position = state.weak_topics.iter().position(|w| {
                w.student_id == commit.student_id
                    && w.subject_id == commit.subject_id
                    && &w.topic_code == topic
            });
            let existing = position.map(|i| state.weak_topics.swap_remove(i));
            state.weak_topics.push(touch_weak_topic(
                existing,
                commit.student_id,
                commit.subject_id,
                topic,
                commit.checked_at,
            ));
        }
        state.practice_tasks.extend(commit.practice_tasks);

        let recent = state.completed_scores(commit.student_id, commit.subject_id, SNAPSHOT_WINDOW);
        let snapshot = progress_snapshot(
            commit.student_id,
            commit.subject_id,
            week_start(commit.checked_at),
            &recent,
            commit.mistakes_by_topic,
        );
        state.snapshots.retain(|s| {
            !(s.student_id == snapshot.student_id
                && s.subject_id == snapshot.subject_id
                && s.week_start == snapshot.week_start)
        });
        state.snapshots.push(snapshot.clone());

        Ok(snapshot)
    }

    async fn find_attempt(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<AttemptRecord>, StoreError> {
        let state = self.state.lock().await;
        let Some(attempt) = state
            .attempts
            .get(&attempt_id)
            .filter(|a| a.student_id == student_id)
        else {
            return Ok(None);
        };
        let test = state.test(attempt.test_id)?.clone();
        let subject = state.subject(test.subject_id)?.clone();
        Ok(Some(AttemptRecord {
            attempt: attempt.clone(),
            questions: state.questions_of(test.id),
            answers: state.answers_of(attempt_id),
            feedback: state.feedback.get(&attempt_id).cloned(),
            recommendations: state
                .recommendations
                .iter()
                .filter(|r| r.attempt_id == attempt_id)
                .cloned()
                .collect(),
            test,
            subject,
        }))
    }

    async fn list_attempts(
        &self,
        filter: AttemptFilter,
    ) -> Result<(Vec<AttemptListing>, usize), StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&TestAttempt> = state
            .attempts
            .values()
            .filter(|a| a.student_id == filter.student_id)
            .filter(|a| match filter.subject_id {
                Some(subject_id) => state.subject_of_attempt(a) == Some(subject_id),
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| newest_first(a, b));
        let total = matching.len();

        let mut rows = Vec::new();
        for attempt in matching.into_iter().skip(filter.offset).take(filter.limit) {
            let test = state.test(attempt.test_id)?;
            rows.push(AttemptListing {
                attempt: attempt.clone(),
                subject: state.subject(test.subject_id)?.clone(),
                test: test.clone(),
            });
        }
        Ok((rows, total))
    }

    async fn weak_topics(
        &self,
        student_id: Uuid,
        subject_id: Option<Uuid>,
    ) -> Result<Vec<WeakTopic>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .weak_topics
            .iter()
            .filter(|w| w.student_id == student_id)
            .filter(|w| subject_id.map_or(true, |id| w.subject_id == id))
            .cloned()
            .collect())
    }

    async fn progress_snapshots(
        &self,
        student_id: Uuid,
        subject_id: Option<Uuid>,
    ) -> Result<Vec<ProgressSnapshot>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .snapshots
            .iter()
            .filter(|s| s.student_id == student_id)
            .filter(|s| subject_id.map_or(true, |id| s.subject_id == id))
            .cloned()
            .collect())
    }
}
