//! Attempt lifecycle manager.
//!
//! Orchestrates test creation, question persistence, attempt reuse, answer
//! upserts, grading and the derived feedback/analytics writes. Storage goes
//! through an injected [`Repository`]; every mutating step is one repository
//! call so it is applied atomically.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::analytics::{build_recommendations, explain_mistakes, practice_tasks};
use crate::error::AssessmentError;
use crate::grading::{grade, GradeItem};
use crate::locale::Locale;
use crate::materials::build_material_links;
use crate::model::{
    AttemptStatus, Feedback, ProgressSnapshot, Question, StudentAnswer, Test, TestAttempt,
    TestStatus, WeakTopic,
};
use crate::pipeline::{GenerationInput, QuestionPipeline};
use crate::request::{GenerateSpec, HistoryQuery, SubmitRequest};
use crate::review::AttemptReview;
use crate::traits::{
    AnswerDraft, AnswerGrade, AttemptFilter, AttemptRecord, GradingCommit, Repository,
    Submission, TestBundle,
};
use crate::views::{
    AnswerDetail, AttemptDetails, AttemptResult, AttemptSummary, GenerateOutcome, HistoryPage,
    QuestionScore, SubmitOutcome, TestView,
};

type AttemptKey = (Uuid, Uuid);

/// The caller-facing assessment service.
pub struct AssessmentEngine {
    repo: Arc<dyn Repository>,
    pipeline: QuestionPipeline,
    /// Serializes attempt creation and grading per (test, student).
    locks: Mutex<HashMap<AttemptKey, Arc<Mutex<()>>>>,
}

impl AssessmentEngine {
    pub fn new(repo: Arc<dyn Repository>, pipeline: QuestionPipeline) -> Self {
        Self {
            repo,
            pipeline,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    /// Create a test for `student_id` and fill it with generated questions.
    #[instrument(skip(self, spec), fields(subject = %spec.subject, count = spec.question_count))]
    pub async fn generate(
        &self,
        student_id: Uuid,
        spec: &GenerateSpec,
    ) -> Result<GenerateOutcome, AssessmentError> {
        spec.validate()?;

        let subject = self.repo.ensure_subject(spec.subject.trim()).await?;
        let test = self
            .repo
            .create_test(Test {
                id: Uuid::new_v4(),
                student_id,
                subject_id: subject.id,
                difficulty: spec.difficulty,
                question_count: spec.question_count,
                language: spec.language.clone(),
                status: TestStatus::Generating,
                created_at: Utc::now(),
            })
            .await?;

        let input = GenerationInput {
            subject_name: subject.name.clone(),
            subject_description: subject.description.clone(),
            syllabus: subject.syllabus.clone(),
            language: spec.language.clone(),
            difficulty: spec.difficulty,
            question_count: spec.question_count,
            question_types: spec.question_types.clone(),
            topic_codes: spec.topic_codes.clone(),
        };

        let questions = match self.pipeline.generate(&input).await {
            Ok(questions) => questions,
            Err(err) => return Err(self.fail_test(test.id, &err).await),
        };
        let rows: Vec<Question> = questions
            .iter()
            .map(|q| Question::from_canonical(test.id, q))
            .collect();
        if let Err(err) = self.repo.persist_questions(test.id, rows).await {
            return Err(self.fail_test(test.id, &AssessmentError::from(err)).await);
        }

        info!(test_id = %test.id, questions = questions.len(), "test ready");
        Ok(GenerateOutcome {
            test_id: test.id,
            status: TestStatus::Ready,
            eta_sec: 0,
        })
    }

    /// Best-effort move to `FAILED`; returns the caller-visible error.
    async fn fail_test(&self, test_id: Uuid, cause: &AssessmentError) -> AssessmentError {
        warn!(test_id = %test_id, error = %cause, "test generation failed");
        if let Err(err) = self.repo.mark_test_failed(test_id).await {
            warn!(test_id = %test_id, error = %err, "could not mark test as failed");
        }
        AssessmentError::BusinessRule("cannot generate test".into())
    }

    /// The test with its answer key redacted.
    #[instrument(skip(self))]
    pub async fn test_details(
        &self,
        test_id: Uuid,
        student_id: Uuid,
    ) -> Result<TestView, AssessmentError> {
        let bundle = self.load_test(test_id, student_id).await?;
        Ok(TestView::from(&bundle))
    }

    async fn load_test(&self, test_id: Uuid, student_id: Uuid) -> Result<TestBundle, AssessmentError> {
        self.repo
            .find_test(test_id, student_id)
            .await?
            .ok_or_else(|| AssessmentError::not_found("test", test_id))
    }

    /// Return the open attempt on a test, opening one if needed.
    #[instrument(skip(self))]
    pub async fn start(&self, test_id: Uuid, student_id: Uuid) -> Result<TestAttempt, AssessmentError> {
        let bundle = self.load_test(test_id, student_id).await?;
        ensure_ready(&bundle)?;
        let lock = self.attempt_lock((test_id, student_id)).await;
        let attempt = {
            let _guard = lock.lock().await;
            self.repo
                .find_or_open_attempt(test_id, student_id, Utc::now())
                .await
        };
        self.release_lock((test_id, student_id), lock).await;
        Ok(attempt?)
    }

    /// Record answers and grade the open attempt synchronously.
    #[instrument(skip(self, request), fields(answers = request.answers.len()))]
    pub async fn submit(
        &self,
        test_id: Uuid,
        student_id: Uuid,
        request: &SubmitRequest,
    ) -> Result<SubmitOutcome, AssessmentError> {
        request.validate()?;
        let bundle = self.load_test(test_id, student_id).await?;
        ensure_ready(&bundle)?;

        let key = (test_id, student_id);
        let lock = self.attempt_lock(key).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.submit_locked(&bundle, student_id, request).await
        };
        self.release_lock(key, lock).await;
        outcome
    }

    async fn submit_locked(
        &self,
        bundle: &TestBundle,
        student_id: Uuid,
        request: &SubmitRequest,
    ) -> Result<SubmitOutcome, AssessmentError> {
        let test = &bundle.test;
        let subject = &bundle.subject;
        let locale = Locale::from_tag(&test.language);
        let by_id: HashMap<Uuid, &Question> = bundle.questions.iter().map(|q| (q.id, q)).collect();

        let attempt = self
            .repo
            .find_or_open_attempt(test.id, student_id, Utc::now())
            .await?;

        let drafts: Vec<AnswerDraft> = request
            .answers
            .iter()
            .filter_map(|answer| {
                let question = by_id.get(&answer.question_id)?;
                Some(AnswerDraft {
                    question_id: question.id,
                    selected_option_ids: if question.kind.is_choice() {
                        question.resolve_selection(&answer.selected_option_ids)
                    } else {
                        Vec::new()
                    },
                    answer_text: answer
                        .answer_text
                        .as_deref()
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                })
            })
            .collect();
        let ignored = request.answers.len() - drafts.len();
        if ignored > 0 {
            debug!(attempt_id = %attempt.id, ignored, "ignoring answers to unknown questions");
        }

        let stored = self
            .repo
            .record_submission(Submission {
                attempt_id: attempt.id,
                answers: drafts,
                submitted_at: Utc::now(),
                client_duration_sec: request.client_duration_sec,
            })
            .await?;

        let items: Vec<GradeItem> = stored
            .iter()
            .filter_map(|answer| by_id.get(&answer.question_id).map(|q| grade_item(q, answer)))
            .collect();
        let report = grade(&items);
        let mistakes = report.mistakes_by_frequency();

        let feedback = Feedback {
            attempt_id: attempt.id,
            summary: locale.feedback_summary(report.passed).to_string(),
            passed: report.passed,
            mistakes: explain_mistakes(&mistakes, &subject.name, locale),
        };
        let recommendations =
            build_recommendations(attempt.id, student_id, &mistakes, &subject.name, locale);

        let commit = GradingCommit {
            attempt_id: attempt.id,
            student_id,
            subject_id: subject.id,
            checked_at: Utc::now(),
            grades: report
                .outcomes
                .iter()
                .map(|o| AnswerGrade {
                    question_id: o.question_id,
                    is_correct: o.is_correct,
                    score_points: o.score_points,
                    rationale: o.rationale.text(locale).to_string(),
                })
                .collect(),
            score_points: report.total_points,
            score_percent: report.percent,
            passed: report.passed,
            feedback,
            weak_topics: recommendations.iter().map(|r| r.topic_code.clone()).collect(),
            practice_tasks: practice_tasks(subject.id, &recommendations),
            recommendations,
            mistakes_by_topic: report.mistakes.clone(),
        };
        let snapshot = self.repo.commit_grading(commit).await?;

        info!(
            attempt_id = %attempt.id,
            percent = report.percent,
            passed = report.passed,
            avg_score = snapshot.avg_score,
            trend = %snapshot.trend,
            "attempt graded"
        );
        Ok(SubmitOutcome {
            attempt_id: attempt.id,
            status: AttemptStatus::Completed,
            score_percent: report.percent,
            passed: report.passed,
        })
    }

    async fn attempt_lock(&self, key: AttemptKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key).or_default().clone()
    }

    /// Drop the lock entry once nobody else holds or awaits it.
    async fn release_lock(&self, key: AttemptKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map plus ours.
        if Arc::strong_count(&lock) <= 2 {
            locks.remove(&key);
        }
    }

    async fn load_attempt(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
    ) -> Result<AttemptRecord, AssessmentError> {
        self.repo
            .find_attempt(attempt_id, student_id)
            .await?
            .ok_or_else(|| AssessmentError::not_found("attempt", attempt_id))
    }

    async fn load_completed(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
    ) -> Result<AttemptRecord, AssessmentError> {
        let record = self.load_attempt(attempt_id, student_id).await?;
        if record.attempt.status != AttemptStatus::Completed {
            return Err(AssessmentError::not_found("completed attempt", attempt_id));
        }
        Ok(record)
    }

    /// Scores of a completed attempt.
    #[instrument(skip(self))]
    pub async fn result(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
    ) -> Result<AttemptResult, AssessmentError> {
        let record = self.load_completed(attempt_id, student_id).await?;
        let max_points: HashMap<Uuid, f64> = record
            .questions
            .iter()
            .map(|q| (q.id, q.max_points()))
            .collect();
        let attempt = &record.attempt;
        Ok(AttemptResult {
            attempt_id: attempt.id,
            test_id: attempt.test_id,
            score_points: attempt.score_points.unwrap_or_default(),
            score_percent: attempt.score_percent.unwrap_or_default(),
            passed: attempt.passed.unwrap_or(false),
            checked_at: attempt.checked_at,
            breakdown: record
                .answers
                .iter()
                .map(|a| QuestionScore {
                    question_id: a.question_id,
                    is_correct: a.is_correct.unwrap_or(false),
                    score_points: a.score_points.unwrap_or_default(),
                    max_points: max_points.get(&a.question_id).copied().unwrap_or_default(),
                })
                .collect(),
        })
    }

    /// Feedback and recommendations of a completed attempt.
    #[instrument(skip(self))]
    pub async fn review(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
    ) -> Result<AttemptReview, AssessmentError> {
        let record = self.load_completed(attempt_id, student_id).await?;
        let locale = Locale::from_tag(&record.test.language);
        let subject_name = record.subject.name.clone();
        let passed = record.attempt.passed.unwrap_or(false);

        let (summary, mut mistakes) = match record.feedback {
            Some(feedback) => (feedback.summary, feedback.mistakes),
            None => (locale.feedback_summary(passed).to_string(), Vec::new()),
        };
        for mistake in mistakes.iter_mut().filter(|m| m.materials.is_empty()) {
            mistake.materials = build_material_links(&mistake.topic_code, &subject_name, locale);
        }
        let mut recommendations = record.recommendations;
        recommendations.sort_by_key(|r| r.priority);
        for rec in recommendations.iter_mut().filter(|r| r.materials.is_empty()) {
            rec.materials = build_material_links(&rec.topic_code, &subject_name, locale);
        }

        Ok(AttemptReview {
            attempt_id,
            subject_name,
            score_percent: record.attempt.score_percent.unwrap_or_default(),
            passed,
            summary,
            mistakes,
            recommendations,
        })
    }

    /// Paged attempt history, newest submission first.
    #[instrument(skip(self, query))]
    pub async fn history(
        &self,
        student_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, AssessmentError> {
        query.validate()?;
        let empty = || HistoryPage {
            items: Vec::new(),
            page: query.page,
            page_size: query.page_size,
            total: 0,
        };

        let subject_id = match query.subject.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(reference) => match self.repo.find_subject(reference).await? {
                Some(subject) => Some(subject.id),
                None => return Ok(empty()),
            },
            None => None,
        };

        let (rows, total) = self
            .repo
            .list_attempts(AttemptFilter {
                student_id,
                subject_id,
                offset: query.offset(),
                limit: query.page_size,
            })
            .await?;

        Ok(HistoryPage {
            items: rows
                .into_iter()
                .map(|row| AttemptSummary {
                    attempt_id: row.attempt.id,
                    test_id: row.test.id,
                    subject_id: row.subject.id,
                    subject_name: row.subject.name,
                    difficulty: row.test.difficulty,
                    status: row.attempt.status,
                    started_at: row.attempt.started_at,
                    submitted_at: row.attempt.submitted_at,
                    score_percent: row.attempt.score_percent,
                    passed: row.attempt.passed,
                })
                .collect(),
            page: query.page,
            page_size: query.page_size,
            total,
        })
    }

    /// Every answer of an attempt with its grade, plus the feedback.
    #[instrument(skip(self))]
    pub async fn attempt_details(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
    ) -> Result<AttemptDetails, AssessmentError> {
        let record = self.load_attempt(attempt_id, student_id).await?;
        let by_id: HashMap<Uuid, &Question> = record.questions.iter().map(|q| (q.id, q)).collect();
        let answers = record
            .answers
            .iter()
            .filter_map(|a| {
                let question = by_id.get(&a.question_id)?;
                Some(AnswerDetail {
                    question_id: a.question_id,
                    kind: question.kind,
                    stem: question.stem.clone(),
                    topic_code: question.topic_code.clone(),
                    selected_option_ids: a.selected_option_ids.clone(),
                    answer_text: a.answer_text.clone(),
                    is_correct: a.is_correct,
                    score_points: a.score_points,
                    max_points: question.max_points(),
                    rationale: a.rationale.clone(),
                })
            })
            .collect();
        Ok(AttemptDetails {
            attempt: record.attempt.clone(),
            subject_name: record.subject.name.clone(),
            answers,
            feedback: record.feedback.clone(),
        })
    }

    /// Weak topics, highest weakness first.
    #[instrument(skip(self))]
    pub async fn weak_topics(
        &self,
        student_id: Uuid,
        subject: Option<&str>,
    ) -> Result<Vec<WeakTopic>, AssessmentError> {
        let Some(subject_id) = self.subject_filter(subject).await? else {
            return Ok(Vec::new());
        };
        let mut topics = self.repo.weak_topics(student_id, subject_id).await?;
        topics.sort_by(|a, b| b.weakness_score.total_cmp(&a.weakness_score));
        Ok(topics)
    }

    /// Weekly progress snapshots, oldest week first.
    #[instrument(skip(self))]
    pub async fn progress(
        &self,
        student_id: Uuid,
        subject: Option<&str>,
    ) -> Result<Vec<ProgressSnapshot>, AssessmentError> {
        let Some(subject_id) = self.subject_filter(subject).await? else {
            return Ok(Vec::new());
        };
        let mut snapshots = self.repo.progress_snapshots(student_id, subject_id).await?;
        snapshots.sort_by_key(|s| s.week_start);
        Ok(snapshots)
    }

    /// `Some(None)` for no filter, `Some(Some(id))` for a known subject and
    /// `None` for an unknown one.
    async fn subject_filter(
        &self,
        subject: Option<&str>,
    ) -> Result<Option<Option<Uuid>>, AssessmentError> {
        match subject.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(Some(None)),
            Some(reference) => Ok(self
                .repo
                .find_subject(reference)
                .await?
                .map(|subject| Some(subject.id))),
        }
    }
}

fn ensure_ready(bundle: &TestBundle) -> Result<(), AssessmentError> {
    if bundle.test.status == TestStatus::Ready {
        Ok(())
    } else {
        Err(AssessmentError::BusinessRule(format!(
            "test {} is {}, not READY",
            bundle.test.id, bundle.test.status
        )))
    }
}

fn grade_item(question: &Question, answer: &StudentAnswer) -> GradeItem {
    GradeItem {
        question_id: question.id,
        kind: question.kind,
        topic_code: question.topic_code.clone(),
        max_points: question.max_points(),
        correct_option_codes: question.correct_option_codes(),
        keywords: question.correct.keywords.clone(),
        selected_codes: question.selected_codes(&answer.selected_option_ids),
        answer_text: answer.answer_text.clone().unwrap_or_default(),
    }
}
