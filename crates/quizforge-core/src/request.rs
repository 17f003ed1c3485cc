//! Caller-facing request payloads and their validation.
//!
//! Validation runs before any state mutation; failures surface as
//! [`AssessmentError::Validation`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AssessmentError;
use crate::model::{Difficulty, QuestionType};

pub const MIN_QUESTION_COUNT: u32 = 3;
pub const MAX_QUESTION_COUNT: u32 = 40;
pub const DEFAULT_QUESTION_COUNT: u32 = 10;
pub const DEFAULT_LANGUAGE: &str = "ru";
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

fn default_question_count() -> u32 {
    DEFAULT_QUESTION_COUNT
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Parameters of one generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSpec {
    /// Subject id or external code.
    pub subject: String,
    pub difficulty: Difficulty,
    pub question_types: Vec<QuestionType>,
    #[serde(default = "default_question_count")]
    pub question_count: u32,
    #[serde(default)]
    pub topic_codes: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

impl GenerateSpec {
    pub fn new(subject: impl Into<String>, difficulty: Difficulty, question_types: Vec<QuestionType>) -> Self {
        Self {
            subject: subject.into(),
            difficulty,
            question_types,
            question_count: DEFAULT_QUESTION_COUNT,
            topic_codes: Vec::new(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_count(mut self, question_count: u32) -> Self {
        self.question_count = question_count;
        self
    }

    pub fn with_topics(mut self, topic_codes: Vec<String>) -> Self {
        self.topic_codes = topic_codes;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn validate(&self) -> Result<(), AssessmentError> {
        if self.subject.trim().is_empty() {
            return Err(AssessmentError::Validation("subject must not be empty".into()));
        }
        if self.question_types.is_empty() {
            return Err(AssessmentError::Validation(
                "at least one question type is required".into(),
            ));
        }
        if !(MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT).contains(&self.question_count) {
            return Err(AssessmentError::Validation(format!(
                "question count must be between {MIN_QUESTION_COUNT} and {MAX_QUESTION_COUNT}, got {}",
                self.question_count
            )));
        }
        Ok(())
    }
}

/// One submitted answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    /// Option ids or option codes.
    #[serde(default)]
    pub selected_option_ids: Vec<String>,
    #[serde(default)]
    pub answer_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub answers: Vec<SubmittedAnswer>,
    #[serde(default)]
    pub client_duration_sec: Option<u32>,
}

impl SubmitRequest {
    pub fn validate(&self) -> Result<(), AssessmentError> {
        if self.answers.is_empty() {
            return Err(AssessmentError::Validation("answers must not be empty".into()));
        }
        if self.client_duration_sec == Some(0) {
            return Err(AssessmentError::Validation(
                "client duration must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Paged attempt history query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Subject id or external code.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            subject: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl HistoryQuery {
    pub fn validate(&self) -> Result<(), AssessmentError> {
        if self.page == 0 {
            return Err(AssessmentError::Validation("page starts at 1".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(AssessmentError::Validation(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1)) * self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_spec_defaults_from_json() {
        let spec: GenerateSpec = serde_json::from_str(
            r#"{"subject":"PHYS-101","difficulty":"MEDIUM","questionTypes":["SINGLE_CHOICE"]}"#,
        )
        .unwrap();
        assert_eq!(spec.question_count, 10);
        assert_eq!(spec.language, "ru");
        assert!(spec.topic_codes.is_empty());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn generate_spec_bounds() {
        let spec = GenerateSpec::new("s", Difficulty::Easy, vec![QuestionType::OpenShort]);
        assert!(spec.clone().with_count(2).validate().is_err());
        assert!(spec.clone().with_count(3).validate().is_ok());
        assert!(spec.clone().with_count(40).validate().is_ok());
        assert!(spec.clone().with_count(41).validate().is_err());
        assert!(GenerateSpec::new(" ", Difficulty::Easy, vec![QuestionType::OpenShort])
            .validate()
            .is_err());
        let err = GenerateSpec::new("s", Difficulty::Easy, vec![]).validate().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn unknown_difficulty_is_rejected_by_serde() {
        let parsed = serde_json::from_str::<GenerateSpec>(
            r#"{"subject":"s","difficulty":"EXTREME","questionTypes":["SINGLE_CHOICE"]}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn submit_request_validation() {
        let empty = SubmitRequest {
            answers: vec![],
            client_duration_sec: None,
        };
        assert!(empty.validate().is_err());
        let zero = SubmitRequest {
            answers: vec![SubmittedAnswer {
                question_id: Uuid::new_v4(),
                selected_option_ids: vec!["A".into()],
                answer_text: None,
            }],
            client_duration_sec: Some(0),
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn history_paging() {
        let query = HistoryQuery {
            subject: None,
            page: 3,
            page_size: 10,
        };
        assert!(query.validate().is_ok());
        assert_eq!(query.offset(), 20);
        assert!(HistoryQuery { page: 0, ..HistoryQuery::default() }.validate().is_err());
        assert!(HistoryQuery { page_size: 101, ..HistoryQuery::default() }.validate().is_err());
    }
}
