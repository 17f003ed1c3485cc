//! Question source backed by a chain of provider endpoints.
//!
//! Endpoints are tried in order, each bounded by its own timeout. Any
//! failure (transport, HTTP status, empty text, nothing parseable, nothing
//! valid) moves on to the next endpoint; when all are exhausted the source
//! yields `None` and the pipeline falls back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::model::CanonicalQuestion;
use crate::normalize::normalize_questions;
use crate::parser::parse_questions_text;
use crate::prompt::build_prompt;
use crate::traits::{GenerateRequest, LlmProvider, QuestionSource, SourceRequest};

/// Default per-endpoint timeout.
pub const DEFAULT_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(8);

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.4;

/// A primary endpoint plus at most one fallback.
pub const MAX_ENDPOINTS: usize = 2;

/// Why one endpoint produced nothing.
#[derive(Debug)]
enum EndpointFailure {
    TimedOut,
    Provider(anyhow::Error),
    NoParseableQuestions,
    RejectedByValidator,
}

pub struct RemoteSource {
    endpoints: Vec<Arc<dyn LlmProvider>>,
    timeout: Duration,
    temperature: f64,
}

impl RemoteSource {
    /// Endpoints beyond [`MAX_ENDPOINTS`] are dropped.
    pub fn new(mut endpoints: Vec<Arc<dyn LlmProvider>>) -> Self {
        if endpoints.len() > MAX_ENDPOINTS {
            warn!(
                configured = endpoints.len(),
                kept = MAX_ENDPOINTS,
                "too many endpoints; extra ones ignored"
            );
            endpoints.truncate(MAX_ENDPOINTS);
        }
        Self {
            endpoints,
            timeout: DEFAULT_ENDPOINT_TIMEOUT,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    async fn try_endpoint(
        &self,
        endpoint: &dyn LlmProvider,
        generate: &GenerateRequest,
        request: &SourceRequest,
    ) -> Result<Vec<CanonicalQuestion>, EndpointFailure> {
        let response = tokio::time::timeout(self.timeout, endpoint.generate(generate))
            .await
            .map_err(|_| EndpointFailure::TimedOut)?
            .map_err(EndpointFailure::Provider)?;

        let raw = parse_questions_text(&response.text);
        if raw.is_empty() {
            return Err(EndpointFailure::NoParseableQuestions);
        }
        let questions = normalize_questions(&raw, request);
        if questions.is_empty() {
            return Err(EndpointFailure::RejectedByValidator);
        }
        debug!(
            endpoint = endpoint.name(),
            model = %response.model,
            latency_ms = response.latency_ms,
            parsed = raw.len(),
            valid = questions.len(),
            "endpoint produced questions"
        );
        Ok(questions)
    }
}

#[async_trait]
impl QuestionSource for RemoteSource {
    fn name(&self) -> &str {
        "remote"
    }

    async fn produce(&self, request: &SourceRequest) -> Option<Vec<CanonicalQuestion>> {
        if self.endpoints.is_empty() {
            return None;
        }
        let generate = GenerateRequest {
            prompt: build_prompt(request),
            temperature: self.temperature,
        };

        for endpoint in &self.endpoints {
            let start = Instant::now();
            match self.try_endpoint(endpoint.as_ref(), &generate, request).await {
                Ok(questions) => {
                    info!(
                        endpoint = endpoint.name(),
                        count = questions.len(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "remote generation succeeded"
                    );
                    return Some(questions);
                }
                Err(failure) => log_failure(endpoint.name(), &failure, self.timeout),
            }
        }
        None
    }
}

fn log_failure(endpoint: &str, failure: &EndpointFailure, timeout: Duration) {
    match failure {
        EndpointFailure::TimedOut => {
            warn!(endpoint, timeout_secs = timeout.as_secs(), "endpoint timed out");
        }
        EndpointFailure::Provider(err) => match err.downcast_ref::<ProviderError>() {
            Some(provider_err) if provider_err.is_permanent() => {
                warn!(endpoint, error = %provider_err, "endpoint rejected credentials");
            }
            Some(provider_err) => {
                warn!(
                    endpoint,
                    error = %provider_err,
                    retry_after_ms = provider_err.retry_after_ms(),
                    "endpoint request failed"
                );
            }
            None => warn!(endpoint, error = %err, "endpoint request failed"),
        },
        EndpointFailure::NoParseableQuestions => {
            warn!(endpoint, "no parseable questions in response");
        }
        EndpointFailure::RejectedByValidator => {
            warn!(endpoint, "questions rejected by validator");
        }
    }
}
