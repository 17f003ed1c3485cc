//! Deterministic question synthesis.
//!
//! Used whenever no provider is configured, every provider endpoint fails, or
//! a provider question cannot be trusted. Output depends only on the topic,
//! type, difficulty, subject name, language and slot index, so two runs with
//! the same input produce identical tests.

use async_trait::async_trait;

use crate::locale::Locale;
use crate::model::{CanonicalQuestion, Difficulty, OptionDraft, QuestionType};
use crate::normalize::fingerprint;
use crate::topics::topic_label;
use crate::traits::{QuestionSource, SourceRequest};

const OPTION_CODES: [&str; 4] = ["A", "B", "C", "D"];

/// Phrase templates for one locale.
struct Templates {
    stems: [&'static str; 4],
    correct: [&'static str; 4],
    wrong: [&'static str; 4],
    open_stem: &'static str,
    open_expected: &'static str,
    open_keywords: [&'static str; 3],
}

// Placeholders: {topic} is the topic label, {subject} the subject name,
// {level} the difficulty hint.
const RU: Templates = Templates {
    stems: [
        "Какое утверждение наиболее точно описывает тему \"{topic}\" в дисциплине \"{subject}\" ({level})?",
        "Выберите вариант, который корректно отражает практику по теме \"{topic}\" для предмета \"{subject}\".",
        "Определите корректный принцип применения темы \"{topic}\" в учебной задаче ({level}).",
        "Какой вариант является правильным для темы \"{topic}\" с точки зрения базовой методики предмета \"{subject}\"?",
    ],
    correct: [
        "Для темы \"{topic}\" в \"{subject}\" важны системность, проверка гипотез и контроль результата.",
        "Корректный подход к \"{topic}\" включает анализ рисков и выбор адекватных мер.",
        "Эффективность \"{topic}\" повышается при регулярной проверке и фиксации результатов.",
        "Практика по \"{topic}\" должна опираться на принципы минимизации ошибок и воспроизводимости решений.",
    ],
    wrong: [
        "Достаточно один раз разобраться в \"{topic}\" и больше никогда не проверять изменения.",
        "В \"{topic}\" можно полностью игнорировать контроль результата, если решение уже получено.",
        "Любые приемы по \"{topic}\" одинаково эффективны, контекст задачи не важен.",
        "Для \"{topic}\" лучше пропустить проверку, чтобы быстрее получить ответ.",
    ],
    open_stem: "Кратко объясните тему \"{topic}\" ({level}) в контексте \"{subject}\": дайте определение, пример применения и одну типичную ошибку.",
    open_expected: "Нужно дать определение темы \"{topic}\", объяснить применение в \"{subject}\" и привести корректный пример.",
    open_keywords: ["определение", "применение", "пример"],
};

const EN: Templates = Templates {
    stems: [
        "Which statement most accurately describes the topic \"{topic}\" in \"{subject}\" ({level})?",
        "Choose the option that correctly reflects good practice on \"{topic}\" for \"{subject}\".",
        "Identify the correct principle for applying \"{topic}\" in a study task ({level}).",
        "Which option is right for the topic \"{topic}\" according to the core methods of \"{subject}\"?",
    ],
    correct: [
        "Working on \"{topic}\" in \"{subject}\" requires a systematic approach, testing assumptions and checking results.",
        "A sound approach to \"{topic}\" includes analysing risks and choosing proportionate measures.",
        "Results on \"{topic}\" improve with regular review and recording of outcomes.",
        "Practice on \"{topic}\" should rely on minimising errors and keeping solutions reproducible.",
    ],
    wrong: [
        "It is enough to study \"{topic}\" once and never revisit any changes.",
        "Checking results on \"{topic}\" can be skipped entirely once an answer exists.",
        "Every technique for \"{topic}\" is equally effective regardless of the task context.",
        "For \"{topic}\" it is better to skip verification to get an answer faster.",
    ],
    open_stem: "Briefly explain the topic \"{topic}\" ({level}) in the context of \"{subject}\": give a definition, an application example and one common mistake.",
    open_expected: "Define the topic \"{topic}\", explain how it is applied in \"{subject}\" and give a correct example.",
    open_keywords: ["definition", "application", "example"],
};

fn templates(locale: Locale) -> &'static Templates {
    match locale {
        Locale::Ru => &RU,
        Locale::En => &EN,
    }
}

fn fill(template: &str, topic: &str, subject: &str, level: &str) -> String {
    template
        .replace("{topic}", topic)
        .replace("{subject}", subject)
        .replace("{level}", level)
}

/// Build the synthetic question for one slot.
pub fn build_question(
    topic: &str,
    kind: QuestionType,
    difficulty: Difficulty,
    index: usize,
    subject_name: &str,
    locale: Locale,
) -> CanonicalQuestion {
    let t = templates(locale);
    let label = topic_label(topic);
    let subject = subject_name.trim();
    let level = locale.difficulty_hint(difficulty);

    if kind == QuestionType::OpenShort {
        let stem = fill(t.open_stem, &label, subject, level);
        let mut keywords = vec![label.clone()];
        keywords.extend(t.open_keywords.iter().map(|k| k.to_string()));
        return CanonicalQuestion {
            kind,
            fingerprint: fingerprint(topic, &stem),
            stem,
            topic_code: topic.to_string(),
            difficulty,
            options: Vec::new(),
            correct_option_codes: Vec::new(),
            expected_answer: Some(fill(t.open_expected, &label, subject, level)),
            keywords,
            rubric: Some(locale.default_rubric()),
        };
    }

    let stem = fill(t.stems[index % t.stems.len()], &label, subject, level);
    let options = build_options(t, kind, index, &label, subject, level);
    let correct_option_codes = options
        .iter()
        .filter(|o| o.is_correct)
        .map(|o| o.code.clone())
        .collect();

    CanonicalQuestion {
        kind,
        fingerprint: fingerprint(topic, &stem),
        stem,
        topic_code: topic.to_string(),
        difficulty,
        options,
        correct_option_codes,
        expected_answer: None,
        keywords: Vec::new(),
        rubric: None,
    }
}

/// Four options; the correct ones start at position `index % 4` so the
/// answer key is not always `A`.
fn build_options(
    t: &Templates,
    kind: QuestionType,
    index: usize,
    label: &str,
    subject: &str,
    level: &str,
) -> Vec<OptionDraft> {
    let pick = |pool: &[&str; 4], shift: usize| fill(pool[(index + shift) % pool.len()], label, subject, level);

    let correct_count = if kind == QuestionType::MultiChoice { 2 } else { 1 };
    let mut correct = (0..correct_count).map(|shift| pick(&t.correct, shift));
    let mut wrong = (0..OPTION_CODES.len() - correct_count).map(|shift| pick(&t.wrong, shift));

    let start = index % OPTION_CODES.len();
    OPTION_CODES
        .iter()
        .enumerate()
        .filter_map(|(position, code)| {
            let offset = (position + OPTION_CODES.len() - start) % OPTION_CODES.len();
            let is_correct = offset < correct_count;
            let text = if is_correct { correct.next() } else { wrong.next() }?;
            Some(OptionDraft {
                code: code.to_string(),
                text,
                is_correct,
            })
        })
        .collect()
}

/// Deterministic [`QuestionSource`]; always produces exactly the requested count.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    /// The question for slot `index`, cycling topics and types round-robin.
    pub fn question_at(&self, request: &SourceRequest, index: usize) -> CanonicalQuestion {
        let locale = request.locale();
        let default_topics;
        let topics = if request.topics.is_empty() {
            default_topics = locale.default_topics();
            &default_topics
        } else {
            &request.topics
        };
        let kind = if request.question_types.is_empty() {
            QuestionType::SingleChoice
        } else {
            request.question_types[index % request.question_types.len()]
        };
        build_question(
            &topics[index % topics.len()],
            kind,
            request.difficulty,
            index,
            &request.subject_name,
            locale,
        )
    }

    pub fn generate(&self, request: &SourceRequest) -> Vec<CanonicalQuestion> {
        (0..request.question_count as usize)
            .map(|index| self.question_at(request, index))
            .collect()
    }
}

#[async_trait]
impl QuestionSource for FallbackGenerator {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn produce(&self, request: &SourceRequest) -> Option<Vec<CanonicalQuestion>> {
        Some(self.generate(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn request(types: Vec<QuestionType>, count: u32, language: &str) -> SourceRequest {
        SourceRequest {
            subject_name: "Физика".into(),
            subject_description: None,
            language: language.into(),
            difficulty: Difficulty::Medium,
            question_count: count,
            question_types: types,
            topics: vec!["физика".into(), "физика практика".into(), "физика типичные ошибки".into()],
        }
    }

    #[test]
    fn exact_count_of_single_choice() {
        let questions = FallbackGenerator.generate(&request(vec![QuestionType::SingleChoice], 5, "ru"));
        assert_eq!(questions.len(), 5);
        for q in &questions {
            assert_eq!(q.kind, QuestionType::SingleChoice);
            assert_eq!(q.options.len(), 4);
            assert_eq!(q.correct_option_codes.len(), 1);
            assert!(!q.fingerprint.is_empty());
            let flagged: Vec<_> = q.options.iter().filter(|o| o.is_correct).map(|o| &o.code).collect();
            assert_eq!(flagged, vec![&q.correct_option_codes[0]]);
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let req = request(
            vec![QuestionType::SingleChoice, QuestionType::MultiChoice, QuestionType::OpenShort],
            9,
            "ru",
        );
        assert_eq!(FallbackGenerator.generate(&req), FallbackGenerator.generate(&req));
    }

    #[test]
    fn types_and_topics_cycle() {
        let req = request(vec![QuestionType::MultiChoice, QuestionType::OpenShort], 4, "en");
        let questions = FallbackGenerator.generate(&req);
        let kinds: Vec<_> = questions.iter().map(|q| q.kind).collect();
        assert_eq!(
            kinds,
            vec![
                QuestionType::MultiChoice,
                QuestionType::OpenShort,
                QuestionType::MultiChoice,
                QuestionType::OpenShort
            ]
        );
        assert_eq!(questions[0].topic_code, "физика");
        assert_eq!(questions[3].topic_code, "физика");
        assert_eq!(questions[0].correct_option_codes.len(), 2);
        assert_eq!(questions[1].rubric.as_ref().map(Vec::len), Some(2));
        assert!(questions[1].keywords.contains(&"definition".to_string()));
    }

    #[test]
    fn correct_position_rotates() {
        let req = request(vec![QuestionType::SingleChoice], 4, "ru");
        let keys: HashSet<_> = FallbackGenerator
            .generate(&req)
            .into_iter()
            .map(|q| q.correct_option_codes[0].clone())
            .collect();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn empty_types_default_to_single_choice() {
        let questions = FallbackGenerator.generate(&request(vec![], 3, "ru"));
        assert!(questions.iter().all(|q| q.kind == QuestionType::SingleChoice));
    }

    #[test]
    fn option_texts_are_distinct() {
        for kind in [QuestionType::SingleChoice, QuestionType::MultiChoice] {
            let q = build_question("loops", kind, Difficulty::Easy, 2, "Programming", Locale::En);
            let texts: HashSet<_> = q.options.iter().map(|o| &o.text).collect();
            assert_eq!(texts.len(), 4);
            assert!(q.stem.contains("loops"));
        }
    }
}
