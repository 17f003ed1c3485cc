//! Error types.
//!
//! `AssessmentError` is what callers of the lifecycle manager see.
//! `StoreError` is raised by repository implementations and `ProviderError`
//! by generation providers. Provider errors are defined here so the remote
//! question source can downcast and classify them without string matching;
//! they never reach the caller.

use thiserror::Error;
use uuid::Uuid;

/// Caller-visible failure of a lifecycle operation.
#[derive(Debug, Error)]
pub enum AssessmentError {
    /// Malformed caller input, rejected before any state mutation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown test, attempt or subject, scoped to the acting student.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The generation pipeline could not produce a usable test.
    #[error("business rule violation: {0}")]
    BusinessRule(String),

    /// The repository failed; the atomic step was not applied.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl AssessmentError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AssessmentError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for API layers.
    pub fn code(&self) -> &'static str {
        match self {
            AssessmentError::Validation(_) => "VALIDATION_ERROR",
            AssessmentError::NotFound { .. } => "NOT_FOUND",
            AssessmentError::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            AssessmentError::Persistence(_) => "INTERNAL_ERROR",
        }
    }
}

/// Errors raised by a `Repository` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record referenced by an atomic step does not exist.
    #[error("{entity} {id} does not exist")]
    MissingRecord { entity: &'static str, id: Uuid },

    /// The step would move a record backwards in its state machine.
    #[error("invalid transition for attempt {id}: {from} -> {to}")]
    InvalidTransition { id: Uuid, from: String, to: String },

    /// The storage backend itself failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors that can occur when interacting with a generation provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found on this endpoint.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response body was not the JSON envelope we expected.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The response carried no candidate text.
    #[error("empty candidate text")]
    EmptyResponse,
}

impl ProviderError {
    /// Returns `true` if this error is permanent for the credential in use.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ProviderError::AuthenticationFailed(_))
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
