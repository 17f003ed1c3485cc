//! Question generation pipeline.
//!
//! A chain of [`QuestionSource`]s tried in order, terminated by the
//! deterministic [`FallbackGenerator`]. The first source returning a
//! non-empty list wins; its output is trimmed or topped up to the requested
//! count so callers always get exactly `question_count` questions.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::AssessmentError;
use crate::fallback::FallbackGenerator;
use crate::locale::Locale;
use crate::model::{CanonicalQuestion, Difficulty, QuestionType};
use crate::normalize::{fingerprint, slot_topic};
use crate::topics::resolve_topics;
use crate::traits::{QuestionSource, SourceRequest};

/// What the lifecycle manager knows when it asks for questions.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub subject_name: String,
    pub subject_description: Option<String>,
    pub syllabus: Option<Value>,
    pub language: String,
    pub difficulty: Difficulty,
    pub question_count: u32,
    pub question_types: Vec<QuestionType>,
    /// Caller-supplied topic codes; may be empty or placeholders.
    pub topic_codes: Vec<String>,
}

impl GenerationInput {
    /// Resolve topics and build the request handed to sources.
    pub fn source_request(&self) -> SourceRequest {
        let locale = Locale::from_tag(&self.language);
        SourceRequest {
            subject_name: self.subject_name.clone(),
            subject_description: self.subject_description.clone(),
            language: self.language.clone(),
            difficulty: self.difficulty,
            question_count: self.question_count,
            question_types: if self.question_types.is_empty() {
                vec![QuestionType::SingleChoice]
            } else {
                self.question_types.clone()
            },
            topics: resolve_topics(
                &self.topic_codes,
                self.syllabus.as_ref(),
                &self.subject_name,
                locale,
            ),
        }
    }
}

pub struct QuestionPipeline {
    sources: Vec<Arc<dyn QuestionSource>>,
    fallback: FallbackGenerator,
}

impl QuestionPipeline {
    /// Pipeline trying `sources` in order before the fallback generator.
    pub fn new(sources: Vec<Arc<dyn QuestionSource>>) -> Self {
        Self {
            sources,
            fallback: FallbackGenerator,
        }
    }

    /// Pipeline with the fallback generator only.
    pub fn fallback_only() -> Self {
        Self::new(Vec::new())
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }

    /// Produce exactly `question_count` canonical questions.
    pub async fn generate(
        &self,
        input: &GenerationInput,
    ) -> Result<Vec<CanonicalQuestion>, AssessmentError> {
        let request = input.source_request();
        let count = request.question_count as usize;

        let mut produced = None;
        for source in &self.sources {
            match source.produce(&request).await {
                Some(questions) if !questions.is_empty() => {
                    info!(source = source.name(), count = questions.len(), "source produced questions");
                    produced = Some(questions);
                    break;
                }
                _ => debug!(source = source.name(), "source produced nothing"),
            }
        }

        let questions = match produced {
            Some(questions) => self.fit_to_count(questions, &request),
            None => {
                info!(count, topics = ?request.topics, "using deterministic fallback generator");
                self.fallback.generate(&request)
            }
        };

        if questions.is_empty() {
            return Err(AssessmentError::BusinessRule(
                "no valid questions could be generated".into(),
            ));
        }
        Ok(questions)
    }

    /// Truncate long output, re-topic placeholders and top up short output
    /// with fallback questions for the missing slots.
    fn fit_to_count(
        &self,
        mut questions: Vec<CanonicalQuestion>,
        request: &SourceRequest,
    ) -> Vec<CanonicalQuestion> {
        let count = request.question_count as usize;
        questions.truncate(count);

        for (index, question) in questions.iter_mut().enumerate() {
            let topic = slot_topic(Some(&question.topic_code), &request.topics, index);
            if topic != question.topic_code {
                question.fingerprint = fingerprint(&topic, &question.stem);
                question.topic_code = topic;
            }
        }

        let produced = questions.len();
        if produced < count {
            debug!(produced, count, "topping up with fallback questions");
            questions.extend((produced..count).map(|index| self.fallback.question_at(request, index)));
        }
        questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Fixed {
        questions: Option<Vec<CanonicalQuestion>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl QuestionSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn produce(&self, _request: &SourceRequest) -> Option<Vec<CanonicalQuestion>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.questions.clone()
        }
    }

    fn input(count: u32) -> GenerationInput {
        GenerationInput {
            subject_name: "Физика".into(),
            subject_description: None,
            syllabus: None,
            language: "ru".into(),
            difficulty: Difficulty::Medium,
            question_count: count,
            question_types: vec![QuestionType::SingleChoice],
            topic_codes: Vec::new(),
        }
    }

    fn provider_question(topic: &str, stem: &str) -> CanonicalQuestion {
        let mut q = FallbackGenerator.question_at(&input(1).source_request(), 0);
        q.topic_code = topic.into();
        q.stem = stem.into();
        q.fingerprint = fingerprint(topic, stem);
        q
    }

    #[tokio::test]
    async fn no_sources_uses_fallback_with_exact_count() {
        let pipeline = QuestionPipeline::fallback_only();
        let questions = pipeline.generate(&input(5)).await.unwrap();
        assert_eq!(questions.len(), 5);
        for q in &questions {
            assert_eq!(q.kind, QuestionType::SingleChoice);
            assert_eq!(q.options.len(), 4);
            assert_eq!(q.correct_option_codes.len(), 1);
            assert!(!q.fingerprint.is_empty());
        }
        assert_eq!(questions[0].topic_code, "физика");
        assert_eq!(pipeline.source_names(), vec!["fallback"]);
    }

    #[tokio::test]
    async fn empty_source_falls_through() {
        let source = Arc::new(Fixed {
            questions: Some(Vec::new()),
            calls: AtomicU32::new(0),
        });
        let sources: Vec<Arc<dyn QuestionSource>> = vec![source.clone()];
        let pipeline = QuestionPipeline::new(sources);
        let questions = pipeline.generate(&input(3)).await.unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_output_is_topped_up_and_long_output_truncated() {
        let source: Arc<dyn QuestionSource> = Arc::new(Fixed {
            questions: Some(vec![provider_question("оптика", "Что такое свет?")]),
            calls: AtomicU32::new(0),
        });
        let pipeline = QuestionPipeline::new(vec![source]);
        let questions = pipeline.generate(&input(4)).await.unwrap();
        assert_eq!(questions.len(), 4);
        assert_eq!(questions[0].stem, "Что такое свет?");
        assert_ne!(questions[1].stem, "Что такое свет?");

        let many = (0..6).map(|i| provider_question("оптика", &format!("Q{i}"))).collect();
        let source: Arc<dyn QuestionSource> = Arc::new(Fixed {
            questions: Some(many),
            calls: AtomicU32::new(0),
        });
        let questions = QuestionPipeline::new(vec![source]).generate(&input(3)).await.unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[2].stem, "Q2");
    }

    #[tokio::test]
    async fn placeholder_topics_are_replaced_and_fingerprint_recomputed() {
        let source: Arc<dyn QuestionSource> = Arc::new(Fixed {
            questions: Some(vec![provider_question("general", "Stem")]),
            calls: AtomicU32::new(0),
        });
        let questions = QuestionPipeline::new(vec![source]).generate(&input(3)).await.unwrap();
        assert_eq!(questions[0].topic_code, "физика");
        assert_eq!(questions[0].fingerprint, fingerprint("физика", "Stem"));
    }

    #[tokio::test]
    async fn explicit_topics_drive_fallback() {
        let mut request = input(4);
        request.topic_codes = vec!["механика".into(), "core".into(), "оптика".into()];
        let questions = QuestionPipeline::fallback_only().generate(&request).await.unwrap();
        let topics: Vec<_> = questions.iter().map(|q| q.topic_code.as_str()).collect();
        assert_eq!(topics, vec!["механика", "оптика", "механика", "оптика"]);
    }
}
