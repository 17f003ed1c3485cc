//! Locale-dependent texts.
//!
//! A language tag starting with `en` selects English; everything else falls
//! back to Russian, the product's primary language.

use serde::{Deserialize, Serialize};

use crate::model::{Difficulty, RubricCriterion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Ru,
    En,
}

impl Locale {
    pub fn from_tag(tag: &str) -> Self {
        if tag.trim().to_lowercase().starts_with("en") {
            Locale::En
        } else {
            Locale::Ru
        }
    }

    /// Wikipedia subdomain for reference links.
    pub fn wiki_domain(self) -> &'static str {
        match self {
            Locale::Ru => "ru.wikipedia.org",
            Locale::En => "en.wikipedia.org",
        }
    }

    /// Topics used when nothing can be inferred from the request.
    pub fn default_topics(self) -> Vec<String> {
        let topics: &[&str] = match self {
            Locale::Ru => &["основы", "практика", "типичные ошибки"],
            Locale::En => &["basics", "practice", "pitfalls"],
        };
        topics.iter().map(|t| t.to_string()).collect()
    }

    /// Variants derived from a keyword base taken from the subject name.
    pub fn subject_topic_variants(self, base: &str) -> Vec<String> {
        match self {
            Locale::Ru => vec![
                base.to_string(),
                format!("{base} практика"),
                format!("{base} типичные ошибки"),
            ],
            Locale::En => vec![
                base.to_string(),
                format!("{base} practice"),
                format!("{base} common mistakes"),
            ],
        }
    }

    /// Variants used when exactly one topic could be inferred.
    pub fn single_topic_variants(self, topic: &str) -> Vec<String> {
        match self {
            Locale::Ru => vec![
                topic.to_string(),
                format!("{topic} практика"),
                format!("{topic} кейсы"),
            ],
            Locale::En => vec![
                topic.to_string(),
                format!("{topic} practice"),
                format!("{topic} cases"),
            ],
        }
    }

    pub fn difficulty_hint(self, difficulty: Difficulty) -> &'static str {
        match (self, difficulty) {
            (Locale::Ru, Difficulty::Easy) => "базовый уровень",
            (Locale::Ru, Difficulty::Medium) => "базовый+ уровень",
            (Locale::Ru, Difficulty::Hard) => "углубленный уровень",
            (Locale::En, Difficulty::Easy) => "basic level",
            (Locale::En, Difficulty::Medium) => "intermediate level",
            (Locale::En, Difficulty::Hard) => "advanced level",
        }
    }

    /// Two fixed criteria totalling 5 points.
    pub fn default_rubric(self) -> Vec<RubricCriterion> {
        let (correctness, completeness) = match self {
            Locale::Ru => ("Корректность", "Полнота"),
            Locale::En => ("Correctness", "Completeness"),
        };
        vec![
            RubricCriterion {
                criterion: correctness.to_string(),
                max_points: 3.0,
            },
            RubricCriterion {
                criterion: completeness.to_string(),
                max_points: 2.0,
            },
        ]
    }

    pub fn default_keywords(self, topic: &str) -> Vec<String> {
        match self {
            Locale::Ru => vec![topic.to_string(), "определение".into(), "пример".into()],
            Locale::En => vec![topic.to_string(), "definition".into(), "example".into()],
        }
    }

    pub fn default_expected_answer(self, topic: &str) -> String {
        match self {
            Locale::Ru => format!(
                "Дать корректное объяснение темы \"{topic}\" и привести 1 практический пример."
            ),
            Locale::En => format!(
                "Give a correct explanation of the topic \"{topic}\" and one practical example."
            ),
        }
    }

    pub fn feedback_summary(self, passed: bool) -> &'static str {
        match (self, passed) {
            (Locale::Ru, true) => "Тест успешно пройден. Есть темы для закрепления.",
            (Locale::Ru, false) => "Тест не пройден. Требуется повторение ключевых тем.",
            (Locale::En, true) => "Test passed. Some topics are worth reinforcing.",
            (Locale::En, false) => "Test failed. Key topics need to be reviewed.",
        }
    }

    pub fn mistake_why(self, topic: &str, count: u32) -> String {
        match self {
            Locale::Ru => format!("Ошибки по теме {topic}: {count}"),
            Locale::En => format!("Mistakes on topic {topic}: {count}"),
        }
    }

    pub fn mistake_fix(self, topic: &str) -> String {
        match self {
            Locale::Ru => format!("Повторить теорию и выполнить практику по теме {topic}."),
            Locale::En => format!("Review the theory and practice the topic {topic}."),
        }
    }

    pub fn recommendation_text(self, topic: &str, count: u32) -> String {
        let tasks = (count + 1).max(3);
        match self {
            Locale::Ru => format!(
                "Повторить тему {topic} и решить минимум {tasks} практических задач."
            ),
            Locale::En => format!("Review the topic {topic} and solve at least {tasks} practice tasks."),
        }
    }
}
