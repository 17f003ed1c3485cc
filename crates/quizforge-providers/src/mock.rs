//! Mock provider for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use quizforge_core::error::ProviderError;
use quizforge_core::traits::{GenerateRequest, GenerateResponse, LlmProvider};

/// A mock generation endpoint for exercising the pipeline without network
/// calls.
///
/// Returns configurable text based on prompt content matching, or fails
/// every call with a fixed error.
pub struct MockProvider {
    name: String,
    /// Map of prompt substring → response text.
    responses: HashMap<String, String>,
    /// Default response if no prompt matches.
    default_response: String,
    /// Produces the error for every call when set.
    failure: Option<fn() -> ProviderError>,
    call_count: AtomicU32,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl MockProvider {
    /// Create a new mock provider with the given prompt→response mappings.
    pub fn new(responses: HashMap<String, String>) -> Self {
        Self {
            name: "mock".to_string(),
            responses,
            default_response: r#"{"questions":[]}"#.to_string(),
            failure: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same text.
    pub fn with_fixed_response(response: &str) -> Self {
        Self {
            default_response: response.to_string(),
            ..Self::new(HashMap::new())
        }
    }

    /// Create a mock whose every call fails.
    pub fn failing(failure: fn() -> ProviderError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(HashMap::new())
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Get the number of calls made to this provider.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this provider.
    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        if let Some(failure) = self.failure {
            return Err(failure().into());
        }

        let text = self
            .responses
            .iter()
            .find(|(key, _)| request.prompt.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default_response.clone());

        Ok(GenerateResponse {
            text,
            model: "mock-model".to_string(),
            latency_ms: 1,
        })
    }
}
