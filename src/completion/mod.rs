//! Completion API access
//!
//! The chat endpoint talks to the language-model provider only through the
//! [`CompletionBackend`] trait, so the provider can be swapped (or faked in
//! tests) without touching the request path.

mod openai;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::OpenAiClient;

/// Failures reported by a completion backend.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Upstream signalled rate limiting (HTTP 429).
    #[error("completion API rate limit exceeded")]
    RateLimited {
        /// Seconds the upstream asked callers to wait, if it said.
        retry_after: Option<u64>,
    },

    /// Upstream rejected our credential (HTTP 401/403).
    #[error("completion API authentication failed")]
    Authentication,

    /// Any other non-success response.
    #[error("completion API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Upstream error message (logged, never returned to clients)
        message: String,
    },

    /// Network failure or timeout.
    #[error("completion API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response could not be interpreted.
    #[error("invalid completion API response: {0}")]
    InvalidResponse(String),
}

/// A service that turns a user prompt into a reply.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Generate a reply for `prompt`.
    ///
    /// Called exactly once per chat request; implementations must not retry
    /// on rate limiting.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}
