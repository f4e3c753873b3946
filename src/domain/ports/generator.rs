//! Generator port - interface for model provider backends.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::models::{GenerationChunk, GenerationRequest, GenerationResponse};

/// Errors surfaced by generator implementations.
///
/// `is_transient` drives the scheduler's retry loop: rate limits, server
/// errors, timeouts, and connection resets are retried; everything else is
/// surfaced immediately.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Malformed request body or parameters (400).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication failed (401).
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Valid credentials but insufficient permissions (403).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Model or endpoint not found (404).
    #[error("Resource not found")]
    NotFound,

    /// Too many requests (429).
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Transient server-side error (500, 502, 503, 504, 529).
    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    /// Connection failed or was reset.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The generator does not support the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Map an HTTP status code and response body to an error.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => Self::InvalidRequest(body),
            401 => Self::InvalidApiKey,
            403 => Self::Forbidden(body),
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500 | 502 | 503 | 504 | 529 => Self::ServerError(status, body),
            other => Self::ServerError(other, body),
        }
    }

    /// Whether the error is transient and should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError(_, _) | Self::Network(_) | Self::Timeout(_)
        )
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for model provider backends.
///
/// A generator is the underlying model that serves agent requests. Different
/// generators may sit on different wire APIs; the core only sees this
/// capability surface.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider name, e.g. "anthropic" or "mock".
    fn name(&self) -> &str;

    /// Default model identifier served by this generator.
    fn model(&self) -> &str;

    /// Execute a request and return the complete response.
    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<GenerationResponse>;

    /// Execute a request with streaming output.
    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> ProviderResult<mpsc::Receiver<GenerationChunk>>;

    /// Count the tokens a request would consume.
    async fn count_tokens(&self, request: &GenerationRequest) -> ProviderResult<u64>;

    /// Produce an embedding for the given text.
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::ServerError(503, String::new()).is_transient());
        assert!(ProviderError::Network("reset".to_string()).is_transient());
        assert!(ProviderError::Timeout(30_000).is_transient());

        assert!(!ProviderError::InvalidApiKey.is_transient());
        assert!(!ProviderError::InvalidRequest(String::new()).is_transient());
        assert!(!ProviderError::NotFound.is_transient());
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            ProviderError::from_status(429, String::new()),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            ProviderError::from_status(529, "overloaded".to_string()),
            ProviderError::ServerError(529, _)
        ));
        assert!(matches!(
            ProviderError::from_status(401, String::new()),
            ProviderError::InvalidApiKey
        ));
    }
}
